//! Client-side session state.
//!
//! One `StudioState` holds everything a visualizer session touches: the
//! catalog snapshot, the selected fabric, the uploaded room photo, the
//! generation flag, the last produced render, and the two catalog filters.
//! It is a plain mutable store with explicit setters — no validation beyond
//! shape (the room photo is checked on construction, not on set), no undo,
//! and no persistence: dropping the state discards everything.
//!
//! Filtering is intentionally client-side: the listing API returns the full
//! catalog and the filters narrow it here.

use serde::{Deserialize, Serialize};

/// Room photos above this size are rejected before upload.
pub const MAX_ROOM_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Filter value that matches every fabric (alongside the empty string).
pub const FILTER_ALL: &str = "all";

/// A catalog entry as the HTTP API serves it.
///
/// The admin read returns absent type/color as `null`; the public read maps
/// them to `""`. Both deserialize into the same shape here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fabric {
    pub id: i64,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub fabric_type: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomImageError {
    #[error("not an image file: {0}")]
    NotAnImage(String),
    #[error("image too large: {0} bytes (max {MAX_ROOM_IMAGE_BYTES})")]
    TooLarge(usize),
}

/// An uploaded room photo, validated on construction.
#[derive(Debug, Clone)]
pub struct RoomImage {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl RoomImage {
    /// Accepts any `image/*` content type up to 10 MiB.
    pub fn new(
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, RoomImageError> {
        let mime = mime.into();
        if !mime.starts_with("image/") {
            return Err(RoomImageError::NotAnImage(mime));
        }
        if bytes.len() > MAX_ROOM_IMAGE_BYTES {
            return Err(RoomImageError::TooLarge(bytes.len()));
        }
        Ok(Self {
            file_name: file_name.into(),
            mime,
            bytes,
        })
    }
}

/// Content type for a room photo path, by extension. Used when loading a
/// file from disk where no Content-Type header exists.
pub fn mime_for_path(path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Shared mutable state for one visualizer session.
#[derive(Debug, Default)]
pub struct StudioState {
    fabrics: Vec<Fabric>,
    selected_fabric: Option<Fabric>,
    room_image: Option<RoomImage>,
    generating: bool,
    generated_render: Option<String>,
    fabric_type_filter: String,
    color_filter: String,
}

impl StudioState {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Setters ────────────────────────────────────────────────────────────

    pub fn set_fabrics(&mut self, fabrics: Vec<Fabric>) {
        self.fabrics = fabrics;
    }

    pub fn set_selected_fabric(&mut self, fabric: Option<Fabric>) {
        self.selected_fabric = fabric;
    }

    pub fn set_room_image(&mut self, image: Option<RoomImage>) {
        self.room_image = image;
    }

    pub fn set_generating(&mut self, generating: bool) {
        self.generating = generating;
    }

    pub fn set_generated_render(&mut self, render: Option<String>) {
        self.generated_render = render;
    }

    pub fn set_fabric_type_filter(&mut self, filter: impl Into<String>) {
        self.fabric_type_filter = filter.into();
    }

    pub fn set_color_filter(&mut self, filter: impl Into<String>) {
        self.color_filter = filter.into();
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn fabrics(&self) -> &[Fabric] {
        &self.fabrics
    }

    pub fn selected_fabric(&self) -> Option<&Fabric> {
        self.selected_fabric.as_ref()
    }

    pub fn room_image(&self) -> Option<&RoomImage> {
        self.room_image.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn generated_render(&self) -> Option<&str> {
        self.generated_render.as_deref()
    }

    /// A render can start once a fabric is selected, a room photo is
    /// attached, and no generation is already in flight.
    pub fn can_generate(&self) -> bool {
        self.selected_fabric.is_some() && self.room_image.is_some() && !self.generating
    }

    /// Catalog entries matching the active filters. An empty or `"all"`
    /// filter value matches everything; otherwise the match is exact.
    pub fn filtered_fabrics(&self) -> Vec<&Fabric> {
        self.fabrics
            .iter()
            .filter(|f| {
                filter_matches(&self.fabric_type_filter, f.fabric_type.as_deref())
                    && filter_matches(&self.color_filter, f.color.as_deref())
            })
            .collect()
    }

    /// Select a catalog entry by id or image URL. Returns false when the
    /// snapshot contains no match (the selection is left unchanged).
    pub fn select_fabric_where(&mut self, reference: &str) -> bool {
        let found = self
            .fabrics
            .iter()
            .find(|f| f.id.to_string() == reference || f.image_url == reference)
            .cloned();
        match found {
            Some(f) => {
                self.selected_fabric = Some(f);
                true
            }
            None => false,
        }
    }

    /// Discard the whole session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn filter_matches(filter: &str, value: Option<&str>) -> bool {
    if filter.is_empty() || filter == FILTER_ALL {
        return true;
    }
    value == Some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fabric(id: i64, name: &str, fabric_type: Option<&str>, color: Option<&str>) -> Fabric {
        Fabric {
            id,
            name: name.to_string(),
            image_url: format!("/fabrics/{name}.jpg"),
            fabric_type: fabric_type.map(str::to_string),
            color: color.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn setters_round_trip() {
        let mut state = StudioState::new();
        assert!(!state.can_generate());

        state.set_fabrics(vec![fabric(1, "lino", None, None)]);
        state.set_selected_fabric(Some(fabric(1, "lino", None, None)));
        let room = RoomImage::new("room.jpg", "image/jpeg", vec![0u8; 16]).unwrap();
        state.set_room_image(Some(room));
        assert!(state.can_generate());

        state.set_generating(true);
        assert!(state.is_generating());
        assert!(!state.can_generate());

        state.set_generated_render(Some("data:image/png;base64,QUJD".to_string()));
        state.set_generating(false);
        assert_eq!(
            state.generated_render(),
            Some("data:image/png;base64,QUJD")
        );
    }

    #[test]
    fn filters_use_all_and_empty_as_wildcards() {
        let mut state = StudioState::new();
        state.set_fabrics(vec![
            fabric(1, "a", Some("Tessuti screen"), Some("Bianco")),
            fabric(2, "b", Some("Tessuti oscuranti"), Some("Rosso")),
            fabric(3, "c", None, None),
        ]);

        assert_eq!(state.filtered_fabrics().len(), 3);

        state.set_fabric_type_filter(FILTER_ALL);
        state.set_color_filter("");
        assert_eq!(state.filtered_fabrics().len(), 3);

        state.set_fabric_type_filter("Tessuti screen");
        let filtered = state.filtered_fabrics();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 1);

        state.set_fabric_type_filter("");
        state.set_color_filter("Rosso");
        let filtered = state.filtered_fabrics();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 2);

        // Entries with no category never match a concrete filter.
        state.set_color_filter("Bianco");
        assert!(state.filtered_fabrics().iter().all(|f| f.id == 1));
    }

    #[test]
    fn select_by_id_or_url() {
        let mut state = StudioState::new();
        state.set_fabrics(vec![fabric(7, "lino", None, None)]);

        assert!(state.select_fabric_where("7"));
        assert_eq!(state.selected_fabric().unwrap().id, 7);

        assert!(state.select_fabric_where("/fabrics/lino.jpg"));
        assert!(!state.select_fabric_where("/fabrics/missing.jpg"));
        // Failed lookup leaves the previous selection in place.
        assert_eq!(state.selected_fabric().unwrap().id, 7);
    }

    #[test]
    fn room_image_validation() {
        assert!(matches!(
            RoomImage::new("a.pdf", "application/pdf", vec![1]),
            Err(RoomImageError::NotAnImage(_))
        ));
        assert!(matches!(
            RoomImage::new("a.jpg", "image/jpeg", vec![0u8; MAX_ROOM_IMAGE_BYTES + 1]),
            Err(RoomImageError::TooLarge(_))
        ));
        assert!(RoomImage::new("a.jpg", "image/jpeg", vec![0u8; 64]).is_ok());
    }

    #[test]
    fn reset_discards_everything() {
        let mut state = StudioState::new();
        state.set_fabrics(vec![fabric(1, "a", None, None)]);
        state.set_fabric_type_filter("Tessuti screen");
        state.set_generated_render(Some("data:image/png;base64,QUJD".to_string()));
        state.reset();
        assert!(state.fabrics().is_empty());
        assert!(state.generated_render().is_none());
        assert_eq!(state.filtered_fabrics().len(), 0);
    }

    #[test]
    fn fabric_deserializes_both_read_shapes() {
        // Admin shape: nulls for absent optionals.
        let admin: Fabric = serde_json::from_str(
            r#"{"id":1,"name":"Lino","imageUrl":"/fabrics/lino.jpg","fabricType":null,"color":null,"createdAt":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(admin.fabric_type, None);

        // Public shape: empty strings.
        let public: Fabric = serde_json::from_str(
            r#"{"id":1,"name":"Lino","imageUrl":"/fabrics/lino.jpg","fabricType":"","color":""}"#,
        )
        .unwrap();
        assert_eq!(public.fabric_type.as_deref(), Some(""));
    }
}
