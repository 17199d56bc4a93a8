use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::pass::{Gain, PassCapture, PassDirection, PassSide};

/// How a channel wants its pass description laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStyle {
    /// One field per line.
    #[default]
    Plain,
    /// Single line, for length-limited posts.
    Compact,
    Markdown,
    Html,
}

/// Everything a publish annotation or image overlay says about a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationFields {
    pub station_label: Option<String>,
    pub satellite: String,
    pub capture_start: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub side: PassSide,
    pub sun_elevation_deg: Option<f64>,
    pub gain: Gain,
    pub direction: PassDirection,
}

impl AnnotationFields {
    pub fn new(
        pass: &PassCapture,
        station_label: Option<&str>,
        sun_elevation_deg: Option<f64>,
        gain: Gain,
    ) -> Self {
        Self {
            station_label: station_label
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
            satellite: pass.satellite.clone(),
            capture_start: pass.start_time().unwrap_or_default(),
            max_elevation_deg: pass.max_elevation_deg,
            side: pass.side,
            sun_elevation_deg,
            gain,
            direction: pass.direction,
        }
    }

    pub fn capture_start_label(&self) -> String {
        self.capture_start.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    pub fn sun_elevation_label(&self) -> String {
        match self.sun_elevation_deg {
            Some(deg) => format!("{:.1}°", deg),
            None => "unknown".to_string(),
        }
    }

    fn gain_text(&self) -> String {
        match self.gain {
            Gain::Automatic => "Automatic".to_string(),
            Gain::Db(db) => format!("{}dB", db),
        }
    }

    /// (label, value) pairs after the headline, in display order.
    fn details(&self) -> [(&'static str, String); 4] {
        [
            (
                "Max Elev",
                format!("{:.0}° {}", self.max_elevation_deg, self.side),
            ),
            ("Sun Elevation", self.sun_elevation_label()),
            ("Gain", self.gain_text()),
            ("Direction", self.direction.label().to_string()),
        ]
    }

    fn headline(&self) -> String {
        format!("{} {}", self.satellite, self.capture_start_label())
    }

    pub fn format(&self, style: AnnotationStyle) -> String {
        match style {
            AnnotationStyle::Plain => self.plain(),
            AnnotationStyle::Compact => self.compact(),
            AnnotationStyle::Markdown => self.markdown(),
            AnnotationStyle::Html => self.html(),
        }
    }

    fn plain(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(self.station_label.clone());
        lines.push(self.headline());
        lines.extend(
            self.details()
                .into_iter()
                .map(|(label, value)| format!("{}: {}", label, value)),
        );
        lines.join("\n")
    }

    fn compact(&self) -> String {
        let mut parts = Vec::new();
        parts.extend(self.station_label.clone());
        parts.push(self.headline());
        parts.extend(
            self.details()
                .into_iter()
                .map(|(label, value)| format!("{} {}", label, value)),
        );
        parts.join(" | ")
    }

    fn markdown(&self) -> String {
        let mut lines = Vec::new();
        if let Some(label) = &self.station_label {
            lines.push(format!("**{}**", label));
        }
        lines.push(self.headline());
        lines.extend(
            self.details()
                .into_iter()
                .map(|(label, value)| format!("**{}:** {}", label, value)),
        );
        lines.join("\n")
    }

    fn html(&self) -> String {
        let mut lines = Vec::new();
        if let Some(label) = &self.station_label {
            lines.push(format!("<b>{}</b>", escape_html(label)));
        }
        lines.push(escape_html(&self.headline()));
        lines.extend(self.details().into_iter().map(|(label, value)| {
            format!("<b>{}:</b> {}", label, escape_html(&value))
        }));
        lines.join("<br>\n")
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
