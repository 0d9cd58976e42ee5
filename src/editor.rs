//! # Field Editing Surface
//!
//! Binds one rich-text editing surface to one field's [`FormattingRecord`]
//! and [`PositionedElement`], together with the discrete controls rendered
//! next to it (X, Y, font family, and the style toggles).
//!
//! Edits arrive from three places and must converge without loops:
//!
//! ```text
//!   surface content ──decode──▶ diff ──▶ FieldChange ──▶ TemplateModel
//!          ▲                       └──▶ mirrored into X/Y/family controls
//!          │
//!   encode (guarded push) ◀── control edit / external reload
//! ```
//!
//! A push only reaches the surface while it is [`SurfaceState::Idle`]:
//! never while the operator holds focus or while a content change is being
//! processed. A suppressed push is deferred and flushed on blur. After a
//! push the surface is [`SurfaceState::Reconciling`] until its content echo
//! comes back (or [`FieldEditingSurface::acknowledge_push`] is called), and
//! that echo is absorbed instead of being propagated again.

use serde::Serialize;
use tracing::debug;

use crate::canvas::FontSizeRange;
use crate::format::{Alignment, FormatChange, FormattingRecord, codec};
use crate::position::{AxisInput, PositionedElement};
use crate::template::{CustomField, FieldChange};

/// Re-entrancy state of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceState {
    /// Nothing in progress; programmatic pushes are allowed.
    Idle,
    /// The operator is editing (focus held, or a content change is being
    /// processed).
    Editing,
    /// A programmatic push was installed and its echo is outstanding.
    Reconciling,
}

/// Editing surface for one custom field.
#[derive(Debug, Clone)]
pub struct FieldEditingSurface {
    field_id: String,
    range: FontSizeRange,
    state: SurfaceState,
    focused: bool,
    /// Markup currently shown by the surface.
    content: String,
    /// Bumped on every programmatic push so hosts can detect them.
    revision: u64,
    /// Last-known record, including control edits not yet shown.
    record: FormattingRecord,
    /// Record of the markup last installed or reported; content changes are
    /// diffed against it so a deferred push is not undone by typing.
    installed: FormattingRecord,
    position: PositionedElement,
    x: AxisInput,
    y: AxisInput,
    deferred_push: bool,
}

impl FieldEditingSurface {
    pub fn new(field: &CustomField, range: FontSizeRange) -> Self {
        Self {
            field_id: field.id.clone(),
            range,
            state: SurfaceState::Idle,
            focused: false,
            content: codec::encode(&field.format),
            revision: 0,
            record: field.format.clone(),
            installed: field.format.clone(),
            position: field.position,
            x: AxisInput::new(field.position.x),
            y: AxisInput::new(field.position.y),
            deferred_push: false,
        }
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn record(&self) -> &FormattingRecord {
        &self.record
    }

    pub fn position(&self) -> &PositionedElement {
        &self.position
    }

    pub fn x_input(&self) -> &AxisInput {
        &self.x
    }

    pub fn y_input(&self) -> &AxisInput {
        &self.y
    }

    /// Value of the font-family selector.
    pub fn font_family(&self) -> &str {
        &self.record.font_family
    }

    pub fn has_deferred_push(&self) -> bool {
        self.deferred_push
    }

    // ------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------

    pub fn focus(&mut self) {
        self.focused = true;
        self.state = SurfaceState::Editing;
    }

    /// Drop focus: commit the X/Y controls and flush any deferred push.
    pub fn blur(&mut self) -> Vec<FieldChange> {
        self.focused = false;
        self.state = SurfaceState::Idle;
        let mut changes = self.commit_x();
        changes.extend(self.commit_y());
        if self.deferred_push {
            self.push_content();
        }
        changes
    }

    // ------------------------------------------------------------------
    // Surface → model
    // ------------------------------------------------------------------

    /// The surface reported new markup.
    ///
    /// Returns the changes to apply to the owning field; empty for the echo
    /// of a programmatic push or when nothing differs.
    pub fn on_content_change(&mut self, markup: &str) -> Vec<FieldChange> {
        if self.state == SurfaceState::Reconciling && markup == self.content {
            self.state = SurfaceState::Idle;
            return Vec::new();
        }

        self.state = SurfaceState::Editing;
        self.content = markup.to_string();

        // Only what the operator changed in the surface is taken; attributes
        // they did not touch keep any pending control value.
        let decoded = codec::decode(markup, self.range);
        let typed = self.installed.diff(&decoded);
        self.installed = decoded;
        let mut changes = Vec::new();
        for change in typed {
            if self.alters_record(&change) {
                changes.extend(self.apply_format(change));
            }
        }
        if self.deferred_push && self.record == self.installed {
            self.deferred_push = false;
        }

        self.state = if self.focused {
            SurfaceState::Editing
        } else {
            SurfaceState::Idle
        };
        changes
    }

    /// The surface has installed the last push without echoing it.
    pub fn acknowledge_push(&mut self) {
        if self.state == SurfaceState::Reconciling {
            self.state = SurfaceState::Idle;
        }
    }

    /// Record a format change and mirror it into the bound controls.
    fn apply_format(&mut self, change: FormatChange) -> Vec<FieldChange> {
        self.record.apply(&change);
        let alignment = match &change {
            FormatChange::Alignment(alignment) => Some(*alignment),
            _ => None,
        };
        let mut changes = vec![FieldChange::Format(change)];
        if let Some(alignment) = alignment {
            let before = self.position.x;
            self.position.apply_alignment(alignment);
            if self.position.x != before {
                self.x.set(self.position.x);
                changes.push(FieldChange::X(self.position.x));
            }
        }
        changes
    }

    // ------------------------------------------------------------------
    // Controls → model + surface
    // ------------------------------------------------------------------

    fn alters_record(&self, change: &FormatChange) -> bool {
        let mut next = self.record.clone();
        next.apply(change);
        next != self.record
    }

    fn edit(&mut self, change: FormatChange) -> Vec<FieldChange> {
        if !self.alters_record(&change) {
            return Vec::new();
        }
        let changes = self.apply_format(change);
        self.push_content();
        changes
    }

    /// Sizes outside the canvas range are ignored.
    pub fn set_font_size(&mut self, size: u32) -> Vec<FieldChange> {
        if !self.range.contains(size) {
            return Vec::new();
        }
        self.edit(FormatChange::FontSize(size))
    }

    /// Colors that are not `#rgb`, `#rrggbb` or `rgb()` are ignored.
    pub fn set_color(&mut self, color: &str) -> Vec<FieldChange> {
        match codec::normalize_color(color.trim()) {
            Some(color) => self.edit(FormatChange::Color(color)),
            None => Vec::new(),
        }
    }

    pub fn set_bold(&mut self, on: bool) -> Vec<FieldChange> {
        self.edit(FormatChange::Bold(on))
    }

    pub fn set_italic(&mut self, on: bool) -> Vec<FieldChange> {
        self.edit(FormatChange::Italic(on))
    }

    pub fn set_underline(&mut self, on: bool) -> Vec<FieldChange> {
        self.edit(FormatChange::Underline(on))
    }

    pub fn set_font_family(&mut self, family: &str) -> Vec<FieldChange> {
        let family = family.trim();
        if family.is_empty() {
            return Vec::new();
        }
        self.edit(FormatChange::FontFamily(family.to_string()))
    }

    /// Also applies the alignment anchor rule to x.
    pub fn set_alignment(&mut self, alignment: Alignment) -> Vec<FieldChange> {
        self.edit(FormatChange::Alignment(alignment))
    }

    /// Keystroke in the X control. Out-of-range input is rejected silently.
    pub fn x_keystroke(&mut self, text: &str) -> bool {
        self.x.keystroke(text)
    }

    /// Keystroke in the Y control. Out-of-range input is rejected silently.
    pub fn y_keystroke(&mut self, text: &str) -> bool {
        self.y.keystroke(text)
    }

    /// Commit the X control (blur of the control).
    pub fn commit_x(&mut self) -> Vec<FieldChange> {
        let x = self.x.commit();
        if x == self.position.x {
            return Vec::new();
        }
        self.position.x = x;
        vec![FieldChange::X(x)]
    }

    /// Commit the Y control (blur of the control).
    pub fn commit_y(&mut self) -> Vec<FieldChange> {
        let y = self.y.commit();
        if y == self.position.y {
            return Vec::new();
        }
        self.position.y = y;
        vec![FieldChange::Y(y)]
    }

    // ------------------------------------------------------------------
    // External reload
    // ------------------------------------------------------------------

    /// Take new values from the model (configuration reload).
    pub fn reload(&mut self, field: &CustomField) {
        self.record = field.format.clone();
        self.position = field.position;
        self.x.set(field.position.x);
        self.y.set(field.position.y);
        self.push_content();
    }

    /// Install `encode(record)` into the surface when it is safe to do so.
    fn push_content(&mut self) {
        let markup = codec::encode(&self.record);
        if markup == self.content {
            self.installed = self.record.clone();
            self.deferred_push = false;
            return;
        }
        if self.focused || self.state == SurfaceState::Editing {
            debug!(field = %self.field_id, "surface busy, deferring content push");
            self.deferred_push = true;
            return;
        }
        self.content = markup;
        self.installed = self.record.clone();
        self.revision += 1;
        self.deferred_push = false;
        self.state = SurfaceState::Reconciling;
    }
}
