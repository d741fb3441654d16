// Map camera: web-mercator centre + zoom over a canvas of fixed pixel size.
use crate::model::{Bounds, LatLng};

pub const TILE_PX: f64 = 256.0;
pub const MIN_ZOOM: f64 = 3.0;
pub const MAX_ZOOM: f64 = 20.0;
const MAX_LAT: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: LatLng::new(34.156113, -118.131943),
            zoom: 13.0,
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, width: f64, height: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    fn world_px(&self) -> f64 {
        TILE_PX * 2f64.powf(self.zoom)
    }

    /// World pixel coordinates at the current zoom.
    pub fn project(&self, p: LatLng) -> (f64, f64) {
        let ws = self.world_px();
        let lat = p.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
        let x = (p.lng + 180.0) / 360.0 * ws;
        let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) * 0.5 * ws;
        (x, y)
    }

    pub fn unproject(&self, x: f64, y: f64) -> LatLng {
        let ws = self.world_px();
        let lng = x / ws * 360.0 - 180.0;
        let n = std::f64::consts::PI * (1.0 - 2.0 * y / ws);
        LatLng::new(n.sinh().atan().to_degrees(), lng)
    }

    pub fn to_screen(&self, p: LatLng) -> (f64, f64) {
        let (cx, cy) = self.project(self.center);
        let (x, y) = self.project(p);
        (x - cx + self.width * 0.5, y - cy + self.height * 0.5)
    }

    pub fn to_lat_lng(&self, sx: f64, sy: f64) -> LatLng {
        let (cx, cy) = self.project(self.center);
        self.unproject(cx + sx - self.width * 0.5, cy + sy - self.height * 0.5)
    }

    pub fn bounds(&self) -> Bounds {
        let nw = self.to_lat_lng(0.0, 0.0);
        let se = self.to_lat_lng(self.width, self.height);
        Bounds {
            west: nw.lng,
            south: se.lat,
            east: se.lng,
            north: nw.lat,
        }
    }

    pub fn with_zoom(self, zoom: f64) -> Self {
        Self {
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            ..self
        }
    }

    pub fn with_center(self, center: LatLng) -> Self {
        Self { center, ..self }
    }

    pub fn resized(self, width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            ..self
        }
    }

    /// Zooms keeping the location under the cursor fixed on screen.
    pub fn zoomed_around(self, sx: f64, sy: f64, zoom: f64) -> Self {
        let anchor = self.to_lat_lng(sx, sy);
        let next = self.with_zoom(zoom);
        let (ax, ay) = next.project(anchor);
        let center = next.unproject(ax - (sx - self.width * 0.5), ay - (sy - self.height * 0.5));
        next.with_center(center)
    }

    /// Moves the map content by a screen-pixel delta (drag direction).
    pub fn panned(self, dx: f64, dy: f64) -> Self {
        let (cx, cy) = self.project(self.center);
        let center = self.unproject(cx - dx, cy - dy);
        self.with_center(center)
    }
}
