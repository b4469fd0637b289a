//! Publish/subscribe primitive for sprites and stages.
//!
//! Every sprite and every stage carries an [`EventBus`]: an ordered list of
//! (target, handler) pairs per event name. Firing invokes handlers
//! synchronously in registration order. Handlers are plain `fn` pointers so
//! unsubscription can match on callback identity, and so listener snapshots
//! are cheap to take before dispatch (dispatch hands the handler a `&mut
//! Stage`, which must not alias the bus it came from).
//!
//! A listener registered with a sprite target is recorded on that sprite as
//! an outbound *bind*; when the sprite is detached the stage releases all of
//! its binds in bulk (`debind`), so dead sprites never leave dangling
//! listeners behind.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::canvas::Canvas;
use crate::collision::Contact;
use crate::sprites::SpriteId;
use crate::stage::Stage;

/// Handler for events fired on a sprite.
///
/// `owner` is the sprite the event fired on; `target` is the listener target
/// given at registration (usually the same sprite, but components may listen
/// to events on other sprites).
pub type SpriteHandler = fn(stage: &mut Stage, owner: SpriteId, target: SpriteId, data: &mut EventData);

/// Handler for events fired on the stage itself.
pub type StageHandler = fn(stage: &mut Stage, target: SpriteId, data: &mut EventData);

/// Payload passed to event handlers.
pub enum EventData<'a> {
    /// No payload.
    None,
    /// Per-frame step with the elapsed seconds.
    Step { dt: f32 },
    /// A collision contact. Handlers may mutate it (e.g. record impact).
    Hit(&'a mut Contact),
    /// Another sprite involved in the event.
    Sprite(SpriteId),
    /// A tile involved in the event (sensor tiles), with its layer.
    Tile {
        layer: SpriteId,
        tile: crate::collision::TileRef,
    },
    /// The render surface, for render-pass events.
    Canvas(&'a mut dyn Canvas),
}

/// Where a listener was registered, for bind bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSource {
    Stage,
    Sprite(SpriteId),
}

/// A handler reference that can be matched for removal.
#[derive(Clone, Copy, PartialEq)]
pub enum HandlerRef {
    Sprite(SpriteHandler),
    Stage(StageHandler),
}

/// One outbound subscription owned by a sprite, released on teardown.
#[derive(Clone)]
pub struct Bind {
    pub source: BindSource,
    pub event: String,
    pub handler: HandlerRef,
}

/// Ordered listener lists keyed by event name.
pub struct EventBus<H> {
    listeners: FxHashMap<String, Vec<(SpriteId, H)>>,
}

impl<H> Default for EventBus<H> {
    fn default() -> Self {
        Self {
            listeners: FxHashMap::default(),
        }
    }
}

impl<H: Copy + PartialEq> EventBus<H> {
    /// Append a listener for `event`. Listeners fire in registration order.
    pub fn on(&mut self, event: &str, target: SpriteId, handler: H) {
        self.listeners
            .entry(event.to_owned())
            .or_default()
            .push((target, handler));
    }

    /// Remove listeners for `event`.
    ///
    /// With no `target`, every listener for the event goes away. With a
    /// `target`, only that target's listeners are removed, optionally
    /// narrowed further to a specific `handler`.
    pub fn off(&mut self, event: &str, target: Option<SpriteId>, handler: Option<H>) {
        match target {
            None => {
                self.listeners.remove(event);
            }
            Some(target) => {
                if let Some(list) = self.listeners.get_mut(event) {
                    list.retain(|(t, h)| {
                        *t != target || handler.map(|wanted| wanted != *h).unwrap_or(false)
                    });
                }
            }
        }
    }

    /// Remove every listener registered with `target`, across all events.
    pub fn off_target(&mut self, target: SpriteId) {
        for list in self.listeners.values_mut() {
            list.retain(|(t, _)| *t != target);
        }
    }

    /// Snapshot the listener list for dispatch.
    ///
    /// The snapshot is taken so handlers may freely mutate the bus (add or
    /// remove listeners) while the event is being delivered; such changes
    /// affect the next trigger, not the current one.
    pub fn snapshot(&self, event: &str) -> SmallVec<[(SpriteId, H); 4]> {
        self.listeners
            .get(event)
            .map(|list| list.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True if anything listens for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners.get(event).is_some_and(|l| !l.is_empty())
    }
}
