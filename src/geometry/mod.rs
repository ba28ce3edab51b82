mod cache;
mod preview;
mod rect;
mod rotation;

pub use cache::{decode_crop, focus_area, GeometryCache, SharedGeometry};
pub use preview::{preview_target, select_preview_size, PreviewSize};
pub use rect::{rotate_rect, scale_rect, translate_rect, CoordSpace, Rect, NORMALIZED_EXTENT};
pub use rotation::{
    display_orientation, rotation_count, DisplayRotation, RotationCount, ScreenOrientation,
};
