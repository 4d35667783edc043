//! Result rendering - `CompanyRecord` to a front-end neutral view model
//!
//! The CLI prints `ResultView::to_text`; the TUI draws the same fields into
//! widgets. The map marker is pushed through the `MapWidget` capability.

use crate::domain::company::{CompanyRecord, Franchise, GeoPoint, Territory};
use crate::io::capabilities::MapWidget;
use std::fmt::Write;

pub const MAP_UNAVAILABLE: &str = "Map unavailable for this address.";
pub const ADDRESS_UNAVAILABLE: &str = "Head office address unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Yes,
    No,
    Outside,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub text: String,
    pub tone: BadgeTone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapView {
    Marker { point: GeoPoint, popup: String },
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub name: String,
    /// Company number and status joined by " • "
    pub number_line: String,
    pub address: String,
    pub jurisdiction: Option<String>,
    pub incorporated: Option<String>,
    pub franchise: Badge,
    pub territory: Badge,
    pub signals: Vec<String>,
    pub info: Vec<(&'static str, String)>,
    pub map: MapView,
}

fn franchise_badge(value: Franchise) -> Badge {
    let tone = match value {
        Franchise::Yes => BadgeTone::Yes,
        Franchise::No => BadgeTone::No,
        Franchise::Likely | Franchise::Unknown => BadgeTone::Neutral,
    };
    Badge { text: format!("Franchise: {}", value.as_str()), tone }
}

fn territory_badge(status: Territory) -> Badge {
    let tone = match status {
        Territory::Inside => BadgeTone::Yes,
        Territory::Outside => BadgeTone::Outside,
        Territory::Unknown => BadgeTone::Neutral,
    };
    Badge { text: format!("Territory: {}", status.as_str()), tone }
}

impl ResultView {
    pub fn from_record(record: &CompanyRecord) -> Self {
        let entity = &record.entity;
        let name = if entity.name.trim().is_empty() { "—".to_string() } else { entity.name.clone() };
        let number_line = [entity.company_number.as_deref(), entity.company_status.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" • ");

        let mut signals = vec![if record.address().is_some() {
            "Head office located.".to_string()
        } else {
            "Head office address missing.".to_string()
        }];
        signals.push(record.sales_territory.reason.clone());
        signals.push(record.franchise.reason.clone());
        if let Some(status) = entity.company_status.as_deref().filter(|s| !s.is_empty()) {
            signals.push(format!("Status: {status}"));
        }
        signals.retain(|s| !s.is_empty());

        let info: Vec<(&'static str, String)> = [
            ("Company type", entity.company_type.clone()),
            ("Jurisdiction", entity.jurisdiction.clone()),
            ("Company number", entity.company_number.clone()),
            ("Incorporation date", entity.incorporation_date.clone()),
            ("Raw source", Some(record.source().label().to_string())),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.filter(|v| !v.is_empty()).map(|v| (label, v)))
        .collect();

        let address = record.address().unwrap_or(ADDRESS_UNAVAILABLE).to_string();
        let map = match &record.geo {
            Some(point) => MapView::Marker {
                point: point.clone(),
                popup: format!("{}\n{}", entity.name, record.address().unwrap_or_default()),
            },
            None => MapView::Unavailable,
        };

        Self {
            name,
            number_line,
            address,
            jurisdiction: entity.jurisdiction.as_ref().map(|j| format!("Jurisdiction: {j}")),
            incorporated: entity.incorporation_date.as_ref().map(|d| format!("Incorporated: {d}")),
            franchise: franchise_badge(record.franchise.value),
            territory: territory_badge(record.sales_territory.status),
            signals,
            info,
            map,
        }
    }

    /// Move the map to this result's marker, or clear it
    pub fn apply_map(&self, map: &mut dyn MapWidget) {
        match &self.map {
            MapView::Marker { point, popup } => map.show_marker(point, popup),
            MapView::Unavailable => map.clear(),
        }
    }

    /// Plain-text rendering for terminals and logs
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(512);
        let _ = writeln!(out, "{}", self.name);
        if !self.number_line.is_empty() {
            let _ = writeln!(out, "{}", self.number_line);
        }
        let _ = writeln!(out, "{}", self.address);
        for line in [&self.jurisdiction, &self.incorporated].into_iter().flatten() {
            let _ = writeln!(out, "{line}");
        }
        let _ = writeln!(out, "[{}] [{}]", self.franchise.text, self.territory.text);

        let _ = writeln!(out, "\nSignals:");
        for signal in &self.signals {
            let _ = writeln!(out, "  - {signal}");
        }

        let _ = writeln!(out, "\nDetails:");
        for (label, value) in &self.info {
            let _ = writeln!(out, "  {label:<20}{value}");
        }

        let _ = writeln!(out);
        match &self.map {
            MapView::Marker { point, .. } => {
                let _ = writeln!(out, "Map: {:.5}, {:.5} ({})", point.lat, point.lon, point.label);
            }
            MapView::Unavailable => {
                let _ = writeln!(out, "{MAP_UNAVAILABLE}");
            }
        }
        out
    }
}
