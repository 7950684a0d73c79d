// Server configuration
pub const DEFAULT_PORT: u16 = 3001;

// Map view defaults
pub const DEFAULT_ZOOM: u8 = 15;
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 22;

// Circle marker sizing (pixels)
pub const DEFAULT_RADIUS: u32 = 12;
pub const MIN_RADIUS: u32 = 1;
// Zoom level at which markers start shrinking
pub const RADIUS_SHRINK_ZOOM: u8 = 17;

// Fallback view center when there are no photos and no stored view
// (Chiang Mai, where the first photos were taken)
pub const FALLBACK_LATITUDE: f64 = 18.7933987;
pub const FALLBACK_LONGITUDE: f64 = 98.9841731;

// How many photos get_closest_photos returns
pub const CLOSEST_PHOTOS_LIMIT: usize = 10;
