#![cfg(target_arch = "wasm32")]

use crate::config::{BallpitConfig, SizingMode};
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::lifecycle::Transition;
use crate::pointer::{GlobalListeners, PointerHandler, PointerRegistry, PointerSample, Rect, Surface, SurfaceId};
use crate::webgl::{js_error, WebGlBackend};
use nalgebra::Vector2;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, HtmlCanvasElement, HtmlElement, IntersectionObserver, IntersectionObserverEntry,
    MouseEvent, ResizeObserver, Window,
};

const RESIZE_DEBOUNCE_MS: i32 = 100;

type SharedEngine = Rc<RefCell<Engine<WebGlBackend>>>;
type CanvasRegistry = PointerRegistry<CanvasSurface, DocumentListeners>;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
}

fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| EngineError::Js("no window".to_string()))
}

fn document() -> Result<Document> {
    window()?.document().ok_or_else(|| EngineError::Js("no document".to_string()))
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Pointer hub
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq)]
struct CanvasSurface(HtmlCanvasElement);

impl Surface for CanvasSurface {
    fn bounding_rect(&self) -> Rect {
        let r = self.0.get_bounding_client_rect();
        Rect::new(r.left() as f32, r.top() as f32, r.width() as f32, r.height() as f32)
    }
}

struct BodyClosures {
    body: HtmlElement,
    on_move: Closure<dyn FnMut(MouseEvent)>,
    on_leave: Closure<dyn FnMut(MouseEvent)>,
    on_click: Closure<dyn FnMut(MouseEvent)>,
}

/// `pointermove` / `pointerleave` / `click` on `document.body`, feeding the
/// registry that owns this value.
struct DocumentListeners {
    registry: Weak<RefCell<CanvasRegistry>>,
    active: Option<BodyClosures>,
}

impl DocumentListeners {
    fn forward(
        registry: &Weak<RefCell<CanvasRegistry>>,
        f: impl Fn(&mut CanvasRegistry, Vector2<f32>) + 'static,
    ) -> Closure<dyn FnMut(MouseEvent)> {
        let registry = registry.clone();
        Closure::wrap(Box::new(move |e: MouseEvent| {
            let Some(registry) = registry.upgrade() else { return };
            let Ok(mut registry) = registry.try_borrow_mut() else { return };
            f(&mut registry, Vector2::new(e.client_x() as f32, e.client_y() as f32));
        }) as Box<dyn FnMut(MouseEvent)>)
    }

    fn install(&self) -> Result<BodyClosures> {
        let body = document()?
            .body()
            .ok_or_else(|| EngineError::Js("no document body".to_string()))?;
        let closures = BodyClosures {
            body,
            on_move: Self::forward(&self.registry, |r, p| r.pointer_move(p)),
            on_leave: Self::forward(&self.registry, |r, _| r.pointer_leave()),
            on_click: Self::forward(&self.registry, |r, p| r.click(p)),
        };
        let body = &closures.body;
        body.add_event_listener_with_callback("pointermove", closures.on_move.as_ref().unchecked_ref())
            .map_err(js_error)?;
        body.add_event_listener_with_callback("pointerleave", closures.on_leave.as_ref().unchecked_ref())
            .map_err(js_error)?;
        body.add_event_listener_with_callback("click", closures.on_click.as_ref().unchecked_ref())
            .map_err(js_error)?;
        Ok(closures)
    }
}

impl GlobalListeners for DocumentListeners {
    fn attach(&mut self) {
        match self.install() {
            Ok(closures) => self.active = Some(closures),
            Err(e) => log::error!("pointer listeners not attached: {}", e),
        }
    }

    fn detach(&mut self) {
        let Some(c) = self.active.take() else { return };
        let _ = c.body.remove_event_listener_with_callback("pointermove", c.on_move.as_ref().unchecked_ref());
        let _ = c.body.remove_event_listener_with_callback("pointerleave", c.on_leave.as_ref().unchecked_ref());
        let _ = c.body.remove_event_listener_with_callback("click", c.on_click.as_ref().unchecked_ref());
    }
}

/// Shared pointer registry. Create one per page and pass it to every
/// `Ballpit`; all of them are then served by a single listener set.
#[wasm_bindgen]
pub struct PointerHub {
    registry: Rc<RefCell<CanvasRegistry>>,
}

#[wasm_bindgen]
impl PointerHub {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PointerHub {
        let registry = Rc::new_cyclic(|weak| {
            RefCell::new(PointerRegistry::new(DocumentListeners {
                registry: weak.clone(),
                active: None,
            }))
        });
        PointerHub { registry }
    }

    /// Number of surfaces currently registered.
    pub fn surfaces(&self) -> usize {
        self.registry.borrow().len()
    }
}

impl Default for PointerHub {
    fn default() -> Self { Self::new() }
}

struct EngineHandler {
    engine: Weak<RefCell<Engine<WebGlBackend>>>,
}

impl EngineHandler {
    fn with(&self, f: impl FnOnce(&mut Engine<WebGlBackend>)) {
        if let Some(engine) = self.engine.upgrade() {
            if let Ok(mut engine) = engine.try_borrow_mut() {
                f(&mut engine);
            }
        }
    }
}

impl PointerHandler for EngineHandler {
    fn on_move(&mut self, sample: &PointerSample) {
        self.with(|e| e.pointer_moved(sample.ndc));
    }

    fn on_leave(&mut self, _sample: &PointerSample) {
        self.with(|e| e.pointer_left());
    }
}

// ---------------------------------------------------------------------------
// Frame loop and observers
// ---------------------------------------------------------------------------

/// requestAnimationFrame chain that only reschedules while the engine
/// reports a produced frame.
struct FrameLoop {
    handle: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl FrameLoop {
    fn new(engine: &SharedEngine) -> Rc<Self> {
        let frame_loop = Rc::new(FrameLoop {
            handle: Cell::new(None),
            callback: RefCell::new(None),
        });
        let weak_loop = Rc::downgrade(&frame_loop);
        let weak_engine = Rc::downgrade(engine);
        let callback = Closure::wrap(Box::new(move |now: f64| {
            let (Some(frame_loop), Some(engine)) = (weak_loop.upgrade(), weak_engine.upgrade()) else {
                return;
            };
            frame_loop.handle.set(None);
            let produced = match engine.try_borrow_mut() {
                Ok(mut engine) => engine.frame(now),
                Err(_) => true,
            };
            if produced {
                frame_loop.schedule();
            }
        }) as Box<dyn FnMut(f64)>);
        *frame_loop.callback.borrow_mut() = Some(callback);
        frame_loop
    }

    fn schedule(&self) {
        if self.handle.get().is_some() {
            return;
        }
        let callback = self.callback.borrow();
        let (Some(callback), Ok(window)) = (callback.as_ref(), window()) else { return };
        match window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            Ok(id) => self.handle.set(Some(id)),
            Err(e) => log::error!("requestAnimationFrame failed: {}", js_error(e)),
        }
    }

    fn cancel(&self) {
        if let (Some(id), Ok(window)) = (self.handle.take(), window()) {
            let _ = window.cancel_animation_frame(id);
        }
    }

    fn apply(&self, transition: Transition) {
        match transition {
            Transition::Start => self.schedule(),
            Transition::Stop => self.cancel(),
            Transition::Unchanged => {}
        }
    }

    fn shutdown(&self) {
        self.cancel();
        self.callback.borrow_mut().take();
    }
}

/// Measure the surface for its sizing mode and resize the engine.
fn resize_engine(engine: &SharedEngine, canvas: &HtmlCanvasElement, sizing: SizingMode) {
    let Ok(window) = window() else { return };
    let parent = canvas
        .parent_element()
        .and_then(|p| p.dyn_into::<HtmlElement>().ok())
        .map(|p| (p.offset_width() as f32, p.offset_height() as f32));
    let inner = (
        window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
        window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
    );
    let (w, h) = sizing.resolve(parent, inner);
    let dpr = window.device_pixel_ratio() as f32;
    let Ok(mut engine) = engine.try_borrow_mut() else { return };
    if let Err(e) = engine.resize(w, h, dpr) {
        log::warn!("resize skipped: {}", e);
    }
}

struct Debounce {
    timer: Cell<Option<i32>>,
    run: Closure<dyn FnMut()>,
}

impl Debounce {
    fn trigger(&self) {
        let Ok(window) = window() else { return };
        if let Some(id) = self.timer.take() {
            window.clear_timeout_with_handle(id);
        }
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            self.run.as_ref().unchecked_ref(),
            RESIZE_DEBOUNCE_MS,
        ) {
            Ok(id) => self.timer.set(Some(id)),
            Err(e) => log::warn!("resize timer failed: {}", js_error(e)),
        }
    }

    fn cancel(&self) {
        if let (Some(id), Ok(window)) = (self.timer.take(), window()) {
            window.clear_timeout_with_handle(id);
        }
    }
}

struct Observers {
    window: Window,
    document: Document,
    canvas: HtmlCanvasElement,
    intersection: IntersectionObserver,
    _on_intersect: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
    on_visibility: Closure<dyn FnMut()>,
    on_window_resize: Option<Closure<dyn FnMut()>>,
    parent_resize: Option<ParentResize>,
    debounce: Rc<Debounce>,
}

struct ParentResize {
    parent: web_sys::Element,
    observer: ResizeObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, ResizeObserver)>,
}

impl Observers {
    /// Build every observer and listener, then connect them. On failure
    /// whatever was already connected is removed again.
    fn install(
        engine: &SharedEngine,
        frame_loop: &Rc<FrameLoop>,
        canvas: &HtmlCanvasElement,
        sizing: SizingMode,
    ) -> Result<Self> {
        let observers = Self::build(engine, frame_loop, canvas, sizing)?;
        if let Err(e) = observers.connect() {
            observers.disconnect();
            return Err(e);
        }
        Ok(observers)
    }

    fn build(
        engine: &SharedEngine,
        frame_loop: &Rc<FrameLoop>,
        canvas: &HtmlCanvasElement,
        sizing: SizingMode,
    ) -> Result<Self> {
        let window = window()?;
        let document = document()?;

        let debounce = {
            let engine = Rc::downgrade(engine);
            let canvas = canvas.clone();
            Rc::new(Debounce {
                timer: Cell::new(None),
                run: Closure::wrap(Box::new(move || {
                    if let Some(engine) = engine.upgrade() {
                        resize_engine(&engine, &canvas, sizing);
                    }
                }) as Box<dyn FnMut()>),
            })
        };

        let mut on_window_resize = None;
        let mut parent_resize = None;
        if sizing.is_tracking() {
            let d = Rc::downgrade(&debounce);
            on_window_resize = Some(Closure::wrap(Box::new(move || {
                if let Some(d) = d.upgrade() {
                    d.trigger();
                }
            }) as Box<dyn FnMut()>));

            if let (SizingMode::Parent, Some(parent)) = (sizing, canvas.parent_element()) {
                let d = Rc::downgrade(&debounce);
                let callback = Closure::wrap(Box::new(move |_: js_sys::Array, _: ResizeObserver| {
                    if let Some(d) = d.upgrade() {
                        d.trigger();
                    }
                }) as Box<dyn FnMut(js_sys::Array, ResizeObserver)>);
                let observer = ResizeObserver::new(callback.as_ref().unchecked_ref()).map_err(js_error)?;
                parent_resize = Some(ParentResize { parent, observer, _callback: callback });
            }
        }

        let on_intersect = {
            let engine = Rc::downgrade(engine);
            let frame_loop = Rc::downgrade(frame_loop);
            Closure::wrap(Box::new(move |entries: js_sys::Array, _: IntersectionObserver| {
                let Some(entry) = entries.get(0).dyn_into::<IntersectionObserverEntry>().ok() else {
                    return;
                };
                let (Some(engine), Some(frame_loop)) = (engine.upgrade(), frame_loop.upgrade()) else {
                    return;
                };
                let Ok(mut engine) = engine.try_borrow_mut() else { return };
                let t = engine.set_intersecting(entry.is_intersecting(), now_ms());
                drop(engine);
                frame_loop.apply(t);
            }) as Box<dyn FnMut(js_sys::Array, IntersectionObserver)>)
        };
        let intersection =
            IntersectionObserver::new(on_intersect.as_ref().unchecked_ref()).map_err(js_error)?;

        let on_visibility = {
            let engine = Rc::downgrade(engine);
            let frame_loop = Rc::downgrade(frame_loop);
            let document = document.clone();
            Closure::wrap(Box::new(move || {
                let (Some(engine), Some(frame_loop)) = (engine.upgrade(), frame_loop.upgrade()) else {
                    return;
                };
                let Ok(mut engine) = engine.try_borrow_mut() else { return };
                let t = engine.set_tab_visible(!document.hidden(), now_ms());
                drop(engine);
                frame_loop.apply(t);
            }) as Box<dyn FnMut()>)
        };

        Ok(Self {
            window,
            document,
            canvas: canvas.clone(),
            intersection,
            _on_intersect: on_intersect,
            on_visibility,
            on_window_resize,
            parent_resize,
            debounce,
        })
    }

    fn connect(&self) -> Result<()> {
        if let Some(cb) = &self.on_window_resize {
            self.window
                .add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref())
                .map_err(js_error)?;
        }
        if let Some(p) = &self.parent_resize {
            p.observer.observe(&p.parent);
        }
        self.document
            .add_event_listener_with_callback("visibilitychange", self.on_visibility.as_ref().unchecked_ref())
            .map_err(js_error)?;
        self.intersection.observe(&self.canvas);
        Ok(())
    }

    /// Safe to call on a partially connected set: removing a listener that
    /// was never added is a no-op.
    fn disconnect(&self) {
        if let Some(cb) = &self.on_window_resize {
            let _ = self
                .window
                .remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
        }
        if let Some(p) = &self.parent_resize {
            p.observer.disconnect();
        }
        self.intersection.disconnect();
        let _ = self.document.remove_event_listener_with_callback(
            "visibilitychange",
            self.on_visibility.as_ref().unchecked_ref(),
        );
        self.debounce.cancel();
    }

    fn tab_visible(&self) -> bool {
        !self.document.hidden()
    }
}

// ---------------------------------------------------------------------------
// Ballpit
// ---------------------------------------------------------------------------

struct Mounted {
    engine: SharedEngine,
    frame_loop: Rc<FrameLoop>,
    hub: Rc<RefCell<CanvasRegistry>>,
    pointer: Option<SurfaceId>,
    observers: Observers,
}

impl Mounted {
    fn new(canvas: Option<HtmlCanvasElement>, hub: &PointerHub, config: JsValue) -> Result<Self> {
        let mut config: BallpitConfig = if config.is_undefined() || config.is_null() {
            BallpitConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| EngineError::InvalidConfig(e.to_string()))?
        };

        let canvas = match (canvas, config.context.id.as_deref()) {
            (Some(canvas), _) => canvas,
            (None, Some(id)) => document()?
                .get_element_by_id(id)
                .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
                .ok_or_else(|| EngineError::NotACanvas(id.to_string()))?,
            (None, None) => return Err(EngineError::MissingSurface),
        };
        let _ = canvas.style().set_property("display", "block");

        if config.theme.sim.seed.is_none() {
            config.theme.sim.seed = Some((js_sys::Math::random() * u32::MAX as f64) as u64);
        }
        let sizing = config.context.size;
        let backend = WebGlBackend::new(&canvas, &config.context.renderer_options)?;
        let engine: SharedEngine = Rc::new(RefCell::new(Engine::new(backend, config)));
        resize_engine(&engine, &canvas, sizing);

        let frame_loop = FrameLoop::new(&engine);
        let observers = match Observers::install(&engine, &frame_loop, &canvas, sizing) {
            Ok(observers) => observers,
            Err(e) => {
                frame_loop.shutdown();
                engine.borrow_mut().dispose();
                return Err(e);
            }
        };
        // A tab opened in the background starts hidden; no visibilitychange
        // fires until it is shown.
        let t = engine.borrow_mut().set_tab_visible(observers.tab_visible(), now_ms());
        frame_loop.apply(t);
        let handler = EngineHandler { engine: Rc::downgrade(&engine) };
        let pointer = hub
            .registry
            .borrow_mut()
            .register(CanvasSurface(canvas.clone()), Box::new(handler));

        Ok(Self {
            engine,
            frame_loop,
            hub: hub.registry.clone(),
            pointer,
            observers,
        })
    }

    fn teardown(self) {
        if let Some(id) = self.pointer {
            self.hub.borrow_mut().unregister(id);
        }
        self.observers.disconnect();
        self.frame_loop.shutdown();
        self.engine.borrow_mut().dispose();
    }
}

/// Ball-pit background bound to a canvas.
///
/// Construction never throws: on a configuration error the failure is
/// logged and the instance stays inert (`isReady()` is false).
#[wasm_bindgen]
pub struct Ballpit {
    mounted: Option<Mounted>,
}

#[wasm_bindgen]
impl Ballpit {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: Option<HtmlCanvasElement>, hub: &PointerHub, config: JsValue) -> Ballpit {
        match Mounted::new(canvas, hub, config) {
            Ok(mounted) => Ballpit { mounted: Some(mounted) },
            Err(e) => {
                log::error!("ball pit not created: {}", e);
                Ballpit { mounted: None }
            }
        }
    }

    #[wasm_bindgen(js_name = "isReady")]
    pub fn is_ready(&self) -> bool {
        self.mounted.is_some()
    }

    #[wasm_bindgen(js_name = "setCount")]
    pub fn set_count(&self, count: usize) {
        self.with_engine(|e| e.set_count(count));
    }

    #[wasm_bindgen(js_name = "setColors")]
    pub fn set_colors(&self, colors: Vec<u32>) -> bool {
        self.with_engine(|e| e.set_colors(&colors)).unwrap_or(false)
    }

    #[wasm_bindgen(js_name = "togglePause")]
    pub fn toggle_pause(&self) -> bool {
        self.with_engine(|e| e.toggle_pause()).unwrap_or(false)
    }

    /// Register `callback(viewport)` to run after every resize.
    #[wasm_bindgen(js_name = "onResize")]
    pub fn on_resize(&self, callback: js_sys::Function) {
        self.with_engine(|e| {
            e.set_on_resize(move |viewport| {
                let Ok(value) = serde_wasm_bindgen::to_value(viewport) else { return };
                if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                    log::warn!("resize callback failed: {}", js_error(err));
                }
            })
        });
    }

    pub fn viewport(&self) -> JsValue {
        self.with_engine(|e| serde_wasm_bindgen::to_value(e.viewport()).unwrap_or(JsValue::NULL))
            .unwrap_or(JsValue::NULL)
    }

    pub fn frames(&self) -> f64 {
        self.with_engine(|e| e.frames() as f64).unwrap_or(0.0)
    }

    pub fn positions(&self) -> Vec<f32> {
        self.with_engine(|e| e.physics().buffers().positions().to_vec())
            .unwrap_or_default()
    }

    /// Release listeners, observers and the GPU context. Must be called when
    /// the canvas is unmounted.
    pub fn dispose(&mut self) {
        match self.mounted.take() {
            Some(mounted) => mounted.teardown(),
            None => log::warn!("dispose called on an inactive ball pit"),
        }
    }
}

impl Ballpit {
    fn with_engine<T>(&self, f: impl FnOnce(&mut Engine<WebGlBackend>) -> T) -> Option<T> {
        let mounted = self.mounted.as_ref()?;
        match mounted.engine.try_borrow_mut() {
            Ok(mut engine) => Some(f(&mut engine)),
            Err(_) => {
                log::warn!("ball pit is busy");
                None
            }
        }
    }
}
