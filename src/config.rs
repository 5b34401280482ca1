//! Configuration types for the inversion pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The grid geometry lives in [`GridLayout`];
//! its defaults produce A4 sheets holding three source pages each.

use crate::error::InvertError;
use crate::model::{Point, Rect, Scale};
use crate::progress::ProgressCallback;
use crate::store::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for a pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfinvert::{PipelineConfig, SlotAnchor};
///
/// let config = PipelineConfig::builder()
///     .anchor(SlotAnchor::TopLeft)
///     .archive_entry_name("inverted.pdf")
///     .build()
///     .unwrap();
/// assert_eq!(config.layout.slots, 3);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rasterisation scale for stage A. Default: 1.0 × 1.0.
    ///
    /// At identity, one page unit becomes one pixel and the rebuilt page has
    /// the same size in units as the source.
    pub scale: Scale,

    /// Output sheet geometry. Default: [`GridLayout::default()`].
    pub layout: GridLayout,

    /// Where a page sits inside its slot when aspect ratios differ. Default: centred.
    pub anchor: SlotAnchor,

    /// Name of the single entry inside the archive. Default: `Final_Output.pdf`.
    pub archive_entry_name: String,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// How long the artifact store keeps results. Default: forever.
    pub retention: RetentionPolicy,

    /// Optional progress observer.
    pub progress: Option<ProgressCallback>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scale: Scale::IDENTITY,
            layout: GridLayout::default(),
            anchor: SlotAnchor::default(),
            archive_entry_name: DEFAULT_ENTRY_NAME.to_string(),
            password: None,
            retention: RetentionPolicy::default(),
            progress: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("scale", &self.scale)
            .field("layout", &self.layout)
            .field("anchor", &self.anchor)
            .field("archive_entry_name", &self.archive_entry_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("retention", &self.retention)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn PipelineProgress>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

/// Archive entry name used when none is configured.
pub const DEFAULT_ENTRY_NAME: &str = "Final_Output.pdf";

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn scale(mut self, scale: Scale) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn layout(mut self, layout: GridLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn anchor(mut self, anchor: SlotAnchor) -> Self {
        self.config.anchor = anchor;
        self
    }

    pub fn archive_entry_name(mut self, name: impl Into<String>) -> Self {
        self.config.archive_entry_name = name.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.config.retention = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress = Some(cb);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, InvertError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl PipelineConfig {
    /// Check the constraints [`PipelineConfigBuilder::build`] enforces.
    pub fn validate(&self) -> Result<(), InvertError> {
        let Scale { x, y } = self.scale;
        if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
            return Err(InvertError::InvalidConfig(format!(
                "Scale must be finite and positive, got {x} × {y}"
            )));
        }
        self.layout.validate()?;

        let name = self.archive_entry_name.trim();
        if name.is_empty() {
            return Err(InvertError::InvalidConfig(
                "Archive entry name must not be empty".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(InvertError::InvalidConfig(format!(
                "Archive entry name must not contain path separators: '{name}'"
            )));
        }
        if let RetentionPolicy::MaxEntries(0) = self.retention {
            return Err(InvertError::InvalidConfig(
                "MaxEntries retention must keep at least one entry".into(),
            ));
        }
        Ok(())
    }
}

// ── Grid geometry ────────────────────────────────────────────────────────

/// Placement of a page image inside a slot whose aspect ratio differs.
///
/// The image is always scaled uniformly to fit; only the leftover space is
/// distributed differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotAnchor {
    /// Centre horizontally and vertically. (default)
    #[default]
    Center,
    /// Pin to the slot's top-left corner.
    TopLeft,
}

impl FromStr for SlotAnchor {
    type Err = InvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" => Ok(SlotAnchor::Center),
            "top-left" | "topleft" => Ok(SlotAnchor::TopLeft),
            other => Err(InvertError::InvalidConfig(format!(
                "Unknown slot anchor '{other}' (expected center or top-left)"
            ))),
        }
    }
}

/// Sheet size, margins and label placement of the grid composition.
///
/// Slots are stacked vertically in the column between `side_margin` and
/// `page_width - right_margin`. All values are in page units (1/72 in).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub top_margin: f32,
    pub side_margin: f32,
    pub right_margin: f32,
    /// Vertical gap between consecutive slots.
    pub spacing: f32,
    /// Source pages per sheet.
    pub slots: usize,
    /// The label baseline starts this far left of the right page edge...
    pub label_inset_x: f32,
    /// ...and this far above the bottom edge.
    pub label_inset_y: f32,
    pub label_font_size: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            top_margin: 5.0,
            side_margin: 57.0,
            right_margin: 5.0,
            spacing: 0.0,
            slots: 3,
            label_inset_x: 100.0,
            label_inset_y: 20.0,
            label_font_size: 10.0,
        }
    }
}

impl GridLayout {
    pub fn slot_width(&self) -> f32 {
        self.page_width - self.side_margin - self.right_margin
    }

    pub fn slot_height(&self) -> f32 {
        let gaps = self.slots.saturating_sub(1) as f32 * self.spacing;
        (self.page_height - self.top_margin - gaps) / self.slots.max(1) as f32
    }

    /// Rectangle of slot `j` (0-based, top to bottom).
    pub fn slot_rect(&self, j: usize) -> Rect {
        let height = self.slot_height();
        let top = self.top_margin + j as f32 * (height + self.spacing);
        Rect::new(
            self.side_margin,
            top,
            self.side_margin + self.slot_width(),
            top + height,
        )
    }

    /// Baseline origin of the "Page n" label.
    pub fn label_origin(&self) -> Point {
        Point {
            x: self.page_width - self.label_inset_x,
            y: self.page_height - self.label_inset_y,
        }
    }

    /// Sheets needed for `pages` source pages.
    pub fn sheet_count(&self, pages: usize) -> usize {
        pages.div_ceil(self.slots.max(1))
    }

    pub fn page_bounds(&self) -> Rect {
        Rect::from_size(self.page_width, self.page_height)
    }

    pub fn validate(&self) -> Result<(), InvertError> {
        if self.slots == 0 {
            return Err(InvertError::InvalidConfig(
                "Grid layout needs at least one slot".into(),
            ));
        }
        let values = [
            self.page_width,
            self.page_height,
            self.top_margin,
            self.side_margin,
            self.right_margin,
            self.spacing,
            self.label_inset_x,
            self.label_inset_y,
            self.label_font_size,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(InvertError::InvalidConfig(
                "Grid layout values must be finite and non-negative".into(),
            ));
        }
        if self.slot_width() <= 0.0 || self.slot_height() <= 0.0 {
            return Err(InvertError::InvalidConfig(format!(
                "Grid layout leaves no room for slots ({} × {})",
                self.slot_width(),
                self.slot_height()
            )));
        }
        Ok(())
    }
}
