//! Shared pointer bridge.
//!
//! One [`PointerRegistry`] serves any number of surfaces through a single set
//! of document-level listeners. The listeners are attached when the first
//! surface registers and detached when the last one leaves. Each surface
//! gets its own hover tracking and its own coordinates relative to its
//! bounding box.

use nalgebra::Vector2;
use std::collections::BTreeMap;

/// Bounding box in client (CSS pixel) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// Edges count as inside.
    pub fn contains(&self, p: Vector2<f32>) -> bool {
        p.x >= self.left
            && p.x <= self.left + self.width
            && p.y >= self.top
            && p.y <= self.top + self.height
    }
}

pub trait Surface {
    fn bounding_rect(&self) -> Rect;
}

/// Pointer position relative to one surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerSample {
    /// Pixels from the surface's top-left corner.
    pub position: Vector2<f32>,
    /// Normalized device coordinates, `[-1, 1]` with +Y up.
    pub ndc: Vector2<f32>,
    pub hover: bool,
}

impl PointerSample {
    fn update(&mut self, client: Vector2<f32>, rect: &Rect) {
        self.position = Vector2::new(client.x - rect.left, client.y - rect.top);
        self.ndc = Vector2::new(
            (self.position.x / rect.width) * 2.0 - 1.0,
            (-self.position.y / rect.height) * 2.0 + 1.0,
        );
    }
}

#[allow(unused_variables)]
pub trait PointerHandler {
    fn on_enter(&mut self, sample: &PointerSample) {}
    fn on_move(&mut self, sample: &PointerSample) {}
    fn on_click(&mut self, sample: &PointerSample) {}
    fn on_leave(&mut self, sample: &PointerSample) {}
}

/// The document-level listener set shared by every registered surface.
pub trait GlobalListeners {
    fn attach(&mut self);
    fn detach(&mut self);
}

/// Listener set for hosts that feed events in by hand.
#[derive(Debug, Default)]
pub struct ManualListeners;

impl GlobalListeners for ManualListeners {
    fn attach(&mut self) {}
    fn detach(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

struct Entry<S> {
    surface: S,
    sample: PointerSample,
    handler: Box<dyn PointerHandler>,
}

pub struct PointerRegistry<S, L> {
    entries: BTreeMap<SurfaceId, Entry<S>>,
    listeners: L,
    attached: bool,
    next_id: u64,
    pointer: Vector2<f32>,
}

impl<S: Surface + PartialEq, L: GlobalListeners> PointerRegistry<S, L> {
    pub fn new(listeners: L) -> Self {
        Self {
            entries: BTreeMap::new(),
            listeners,
            attached: false,
            next_id: 0,
            pointer: Vector2::zeros(),
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn is_attached(&self) -> bool { self.attached }

    pub fn listeners(&self) -> &L { &self.listeners }

    pub fn sample(&self, id: SurfaceId) -> Option<PointerSample> {
        self.entries.get(&id).map(|e| e.sample)
    }

    /// Add `surface`. Returns `None` if it is already registered, in which
    /// case `handler` is dropped.
    pub fn register(&mut self, surface: S, handler: Box<dyn PointerHandler>) -> Option<SurfaceId> {
        if self.entries.values().any(|e| e.surface == surface) {
            log::warn!("surface already registered for pointer events");
            return None;
        }
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { surface, sample: PointerSample::default(), handler });
        if !self.attached {
            self.listeners.attach();
            self.attached = true;
        }
        Some(id)
    }

    /// Stop delivering events for `id`. Detaches the global listeners once
    /// no surface is left.
    pub fn unregister(&mut self, id: SurfaceId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if self.entries.is_empty() && self.attached {
            self.listeners.detach();
            self.attached = false;
        }
        removed
    }

    pub fn pointer_move(&mut self, client: Vector2<f32>) {
        self.pointer = client;
        for entry in self.entries.values_mut() {
            let rect = entry.surface.bounding_rect();
            if rect.contains(client) {
                entry.sample.update(client, &rect);
                if !entry.sample.hover {
                    entry.sample.hover = true;
                    entry.handler.on_enter(&entry.sample);
                }
                entry.handler.on_move(&entry.sample);
            } else if entry.sample.hover {
                entry.sample.hover = false;
                entry.handler.on_leave(&entry.sample);
            }
        }
    }

    pub fn click(&mut self, client: Vector2<f32>) {
        self.pointer = client;
        for entry in self.entries.values_mut() {
            let rect = entry.surface.bounding_rect();
            entry.sample.update(client, &rect);
            if rect.contains(client) {
                entry.handler.on_click(&entry.sample);
            }
        }
    }

    /// The pointer left the document: every hovering surface gets a leave.
    pub fn pointer_leave(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.sample.hover {
                entry.sample.hover = false;
                entry.handler.on_leave(&entry.sample);
            }
        }
    }
}
