// SPDX-License-Identifier: GPL-3.0-only

//! Mutually exclusive visual effect selection
//!
//! At most one effect is ever installed on the render path. Toggling the
//! active effect removes it; toggling another one replaces it.

use crate::backends::{EffectKind, FilterRenderTarget};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Effect selection shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FilterSelection {
    /// No effect applied
    #[default]
    None,
    /// Skin softening
    Beauty,
    /// Stylised look
    Cartoon,
    /// Gaussian blur
    Blur,
}

impl FilterSelection {
    /// Selectable effects, in button order
    pub const ALL: [FilterSelection; 3] = [
        FilterSelection::Beauty,
        FilterSelection::Cartoon,
        FilterSelection::Blur,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            FilterSelection::None => "ORIGINAL",
            FilterSelection::Beauty => "BEAUTY",
            FilterSelection::Cartoon => "CARTOON",
            FilterSelection::Blur => "BLUR",
        }
    }

    /// The render-path effect backing this selection
    pub fn effect(&self) -> Option<EffectKind> {
        match self {
            FilterSelection::None => None,
            FilterSelection::Beauty => Some(EffectKind::Beauty),
            FilterSelection::Cartoon => Some(EffectKind::Cartoon),
            FilterSelection::Blur => Some(EffectKind::Blur),
        }
    }
}

/// Requested selection, bumped on every accepted toggle
#[derive(Debug, Default)]
struct Requested {
    active: FilterSelection,
    generation: u64,
}

/// What the render target currently has installed
#[derive(Debug, Default)]
struct Rendered {
    generation: u64,
    installed: FilterSelection,
}

/// Owner of the active [`FilterSelection`] and the render target it drives
///
/// Toggles may arrive from several threads. Each one records its request and
/// then competes for the render gate; whoever holds the gate applies the
/// latest request, so a burst of toggles queued behind a slow render call
/// reaches the target as its final state only.
#[derive(Default)]
pub struct FilterPipeline {
    target: Mutex<Option<Arc<dyn FilterRenderTarget>>>,
    requested: Mutex<Requested>,
    render_gate: Mutex<Rendered>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the render path; effects start cleared
    pub fn attach_target(&self, target: Arc<dyn FilterRenderTarget>) {
        *lock(&self.target) = Some(target);
        self.reset();
    }

    /// Drop the render path and forget the selection (no render calls)
    pub fn detach_target(&self) {
        *lock(&self.target) = None;
        self.reset();
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.target).is_some()
    }

    pub fn active(&self) -> FilterSelection {
        lock(&self.requested).active
    }

    /// Toggle `selection` and return the resulting active selection
    ///
    /// Ignored while no render target is attached.
    pub fn toggle(&self, selection: FilterSelection) -> FilterSelection {
        if !self.is_attached() {
            debug!(?selection, "Filter toggle ignored, render target not attached");
            return self.active();
        }

        let active = {
            let mut requested = lock(&self.requested);
            requested.active = if requested.active == selection {
                FilterSelection::None
            } else {
                selection
            };
            requested.generation += 1;
            requested.active
        };
        info!(filter = active.display_name(), "Filter toggled");

        if self.flush() { active } else { FilterSelection::None }
    }

    /// Apply the latest request to the render target
    ///
    /// Returns `false` if the target was detached while the request waited.
    fn flush(&self) -> bool {
        let mut rendered = lock(&self.render_gate);
        let mut requested = lock(&self.requested);

        // Read under the gate: a detach may have raced this toggle
        let Some(target) = lock(&self.target).clone() else {
            requested.active = FilterSelection::None;
            rendered.installed = FilterSelection::None;
            rendered.generation = requested.generation;
            return false;
        };

        let (active, generation) = (requested.active, requested.generation);
        drop(requested);
        if generation <= rendered.generation {
            // A caller that queued behind us already rendered this request
            return true;
        }
        rendered.generation = generation;
        if active == rendered.installed {
            return true;
        }
        match active.effect() {
            Some(kind) => target.install_effect(kind),
            None => target.clear_effects(),
        }
        rendered.installed = active;
        true
    }

    fn reset(&self) {
        let mut rendered = lock(&self.render_gate);
        let mut requested = lock(&self.requested);
        requested.active = FilterSelection::None;
        rendered.installed = FilterSelection::None;
        rendered.generation = requested.generation;
    }
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("attached", &self.is_attached())
            .field("active", &self.active())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingTarget {
        installs: Mutex<Vec<EffectKind>>,
        clears: Mutex<usize>,
    }

    impl FilterRenderTarget for CountingTarget {
        fn install_effect(&self, kind: EffectKind) {
            self.installs.lock().unwrap().push(kind);
        }

        fn clear_effects(&self) {
            *self.clears.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_unattached_toggle_is_ignored() {
        let pipeline = FilterPipeline::new();
        assert_eq!(pipeline.toggle(FilterSelection::Blur), FilterSelection::None);
        assert_eq!(pipeline.active(), FilterSelection::None);
    }

    #[test]
    fn test_selection_effect_mapping() {
        assert_eq!(FilterSelection::None.effect(), None);
        assert_eq!(FilterSelection::Cartoon.effect(), Some(EffectKind::Cartoon));
    }

    #[test]
    fn test_detach_resets_without_render_calls() {
        let target = Arc::new(CountingTarget::default());
        let pipeline = FilterPipeline::new();
        pipeline.attach_target(target.clone());
        pipeline.toggle(FilterSelection::Beauty);
        pipeline.detach_target();

        assert_eq!(pipeline.active(), FilterSelection::None);
        assert_eq!(*target.installs.lock().unwrap(), vec![EffectKind::Beauty]);
        assert_eq!(*target.clears.lock().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_toggles_settle_on_requested_state() {
        let target = Arc::new(CountingTarget::default());
        let pipeline = Arc::new(FilterPipeline::new());
        pipeline.attach_target(target.clone());

        // An even number of toggles of the same effect always nets to None
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                std::thread::spawn(move || {
                    pipeline.toggle(FilterSelection::Blur);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pipeline.active(), FilterSelection::None);
        let installs = target.installs.lock().unwrap().len();
        let clears = *target.clears.lock().unwrap();
        assert!(installs + clears <= 8);
        // The render path ends with nothing installed
        assert_eq!(installs, clears);
    }

    /// Blocks inside the first Beauty install until released
    struct GatedTarget {
        installs: Mutex<Vec<EffectKind>>,
        entered: Mutex<Option<std::sync::mpsc::Sender<()>>>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl FilterRenderTarget for GatedTarget {
        fn install_effect(&self, kind: EffectKind) {
            self.installs.lock().unwrap().push(kind);
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
        }

        fn clear_effects(&self) {}
    }

    #[test]
    fn test_toggle_queued_behind_detach_does_not_render() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let target = Arc::new(GatedTarget {
            installs: Mutex::new(Vec::new()),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        });
        let pipeline = Arc::new(FilterPipeline::new());
        pipeline.attach_target(target.clone());

        // First toggle holds the render gate inside install_effect
        let first = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.toggle(FilterSelection::Beauty))
        };
        entered_rx.recv().unwrap();

        // Second toggle is accepted and waits for the gate
        let second = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.toggle(FilterSelection::Cartoon))
        };
        thread::sleep(Duration::from_millis(50));

        // Detach clears the slot, then waits for the gate to reset
        let detach = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.detach_target())
        };
        thread::sleep(Duration::from_millis(50));

        release_tx.send(()).unwrap();
        first.join().unwrap();
        second.join().unwrap();
        detach.join().unwrap();

        assert_eq!(*target.installs.lock().unwrap(), vec![EffectKind::Beauty]);
        assert_eq!(pipeline.active(), FilterSelection::None);
        assert!(!pipeline.is_attached());
    }
}
