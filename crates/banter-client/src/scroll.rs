//! Scroll anchor state machine.
//!
//! Owns the message viewport's scroll position across content changes.
//! The embedding view reports discrete events (`scrolled`, `content_grew`,
//! `jump_to_latest`) with current [`Viewport`] measurements and executes
//! the returned [`ScrollEffect`]s; no layout or framework timing leaks in
//! here.
//!
//! Behavior:
//! - first non-empty content jumps straight to the bottom;
//! - near the top edge, request an older page and, once it splices in,
//!   shift the offset by exactly the content growth so the anchored
//!   message does not move;
//! - on tail growth, auto-pin to the new bottom when the user was within
//!   the near-bottom threshold, otherwise raise the "new messages"
//!   affordance and leave the offset alone;
//! - passive height growth (images finishing load, late layout) re-pins
//!   whenever the view is at the bottom.

/// Current measurements of the scrollable message viewport, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Scroll offset from the top of the content.
    pub scroll_top: f64,
    /// Total height of the rendered content.
    pub content_height: f64,
    /// Visible height of the viewport.
    pub viewport_height: f64,
}

impl Viewport {
    /// The scroll offset that shows the very bottom of the content.
    pub fn bottom(&self) -> f64 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    /// Distance between the current position and the true bottom.
    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - self.scroll_top - self.viewport_height).max(0.0)
    }
}

/// Thresholds, both 80 px in the reference behavior.
#[derive(Debug, Clone, Copy)]
pub struct ScrollConfig {
    /// Offset from the top below which an older page is requested.
    pub top_trigger_px: f64,
    /// Distance from the bottom within which tail growth auto-pins.
    pub near_bottom_px: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            top_trigger_px: 80.0,
            near_bottom_px: 80.0,
        }
    }
}

/// Instructions for the embedding view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollEffect {
    /// Set the viewport's scroll offset to this value.
    SetScrollTop(f64),
}

/// Adjustment armed by a content change, resolved when the grown content
/// is next measured.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum PendingAdjust {
    #[default]
    None,
    /// Older content was prepended; compensate by the height delta.
    PreserveAnchor { prev_top: f64, prev_height: f64 },
    /// Tail grew while near the bottom; follow it down.
    PinBottom,
}

/// The scroll anchor controller.
#[derive(Debug, Default)]
pub struct ScrollAnchor {
    config: ScrollConfig,
    has_initial_scrolled: bool,
    is_at_bottom: bool,
    pending_new_messages: bool,
    pending: PendingAdjust,
    last_height: f64,
}

impl ScrollAnchor {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn has_initial_scrolled(&self) -> bool {
        self.has_initial_scrolled
    }

    pub fn is_at_bottom(&self) -> bool {
        self.is_at_bottom
    }

    /// Whether the "jump to latest" affordance should be shown.
    pub fn pending_new_messages(&self) -> bool {
        self.pending_new_messages
    }

    /// First non-empty content: jump the viewport to the bottom.
    pub fn initial_content(&mut self, viewport: Viewport) -> Option<ScrollEffect> {
        if self.has_initial_scrolled {
            return None;
        }
        self.has_initial_scrolled = true;
        self.is_at_bottom = true;
        self.last_height = viewport.content_height;
        Some(ScrollEffect::SetScrollTop(viewport.bottom()))
    }

    /// The user scrolled.  Updates the near-bottom tracking state.
    pub fn scrolled(&mut self, viewport: Viewport) {
        self.is_at_bottom = viewport.distance_from_bottom() <= self.config.near_bottom_px;
        if self.is_at_bottom {
            self.pending_new_messages = false;
        }
    }

    /// Whether the current offset is within the top trigger zone, i.e.
    /// an older page should be requested (subject to the cache's own
    /// in-flight and history checks).
    pub fn wants_older_page(&self, viewport: &Viewport) -> bool {
        self.has_initial_scrolled && viewport.scroll_top <= self.config.top_trigger_px
    }

    /// Arm anchor preservation just before an older page splices in,
    /// capturing the pre-splice measurements.
    pub fn arm_anchor_preserve(&mut self, viewport: Viewport) {
        self.pending = PendingAdjust::PreserveAnchor {
            prev_top: viewport.scroll_top,
            prev_height: viewport.content_height,
        };
    }

    /// Disarm a pending adjustment (the fetch failed; the viewport must
    /// stay untouched).
    pub fn disarm(&mut self) {
        self.pending = PendingAdjust::None;
    }

    /// The tail is about to grow.  Decides between auto-pin and the "new
    /// messages" affordance based on where the viewport was immediately
    /// before the change.
    pub fn tail_will_grow(&mut self, viewport: Viewport) {
        if viewport.distance_from_bottom() <= self.config.near_bottom_px {
            self.pending = PendingAdjust::PinBottom;
        } else {
            self.pending_new_messages = true;
        }
    }

    /// Content was re-measured after a change.  Resolves any armed
    /// adjustment; otherwise re-pins on passive growth while at the
    /// bottom.
    pub fn content_grew(&mut self, viewport: Viewport) -> Option<ScrollEffect> {
        let height_changed = viewport.content_height != self.last_height;
        self.last_height = viewport.content_height;

        match std::mem::take(&mut self.pending) {
            PendingAdjust::PreserveAnchor {
                prev_top,
                prev_height,
            } => Some(ScrollEffect::SetScrollTop(
                viewport.content_height - prev_height + prev_top,
            )),
            PendingAdjust::PinBottom => {
                self.is_at_bottom = true;
                self.pending_new_messages = false;
                Some(ScrollEffect::SetScrollTop(viewport.bottom()))
            }
            PendingAdjust::None if self.is_at_bottom && height_changed => {
                Some(ScrollEffect::SetScrollTop(viewport.bottom()))
            }
            PendingAdjust::None => None,
        }
    }

    /// User-triggered jump to the newest message.
    pub fn jump_to_latest(&mut self, viewport: Viewport) -> ScrollEffect {
        self.is_at_bottom = true;
        self.pending_new_messages = false;
        self.pending = PendingAdjust::None;
        ScrollEffect::SetScrollTop(viewport.bottom())
    }
}
