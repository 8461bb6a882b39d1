//! Rendition ladder planning.
//!
//! Given probed source dimensions, compute the ordered list of output
//! renditions: one per ladder bucket whose long edge fits inside the source,
//! or a single synthesized rendition for sources smaller than the lowest
//! bucket. All output dimensions are forced even for encoder alignment.

use serde::{Deserialize, Serialize};

/// Fixed ascending ladder of long-edge targets.
pub const LADDER: &[u32] = &[144, 270, 360, 540, 720, 1080, 2160, 4320];

/// One resolution variant of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    /// Display name, also the `{res}` component of segment filenames
    /// (e.g. "720p").
    pub name: String,
    pub width: u32,
    pub height: u32,
}

/// Compute the rendition ladder for a source of `width`×`height`.
///
/// Ladder iteration order is preserved in the output. A source smaller than
/// every bucket yields exactly one rendition named after its short edge,
/// clamped (even) to its own size.
pub fn plan_renditions(width: u32, height: u32) -> Vec<Rendition> {
    let long_edge = width.max(height);

    let mut plan: Vec<Rendition> = LADDER
        .iter()
        .filter(|&&v| v <= long_edge)
        .map(|&v| {
            let (w, h) = fit_box(width, height, v);
            Rendition {
                name: format!("{v}p"),
                width: w,
                height: h,
            }
        })
        .collect();

    if plan.is_empty() {
        let short_edge = width.min(height);
        plan.push(Rendition {
            name: format!("{short_edge}p"),
            width: force_even(width),
            height: force_even(height),
        });
    }

    plan
}

/// Scale `(w, h)` to fit inside a `v`×`v` box preserving aspect ratio, then
/// force both dimensions even.
fn fit_box(w: u32, h: u32, v: u32) -> (u32, u32) {
    let scale = f64::from(v) / f64::from(w.max(h));
    let out_w = (f64::from(w) * scale).round() as u32;
    let out_h = (f64::from(h) * scale).round() as u32;
    (force_even(out_w), force_even(out_h))
}

fn force_even(dim: u32) -> u32 {
    dim - dim % 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uhd_source_fills_ladder_up_to_2160() {
        let plan = plan_renditions(3840, 2160);
        let names: Vec<&str> = plan.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            ["144p", "270p", "360p", "540p", "720p", "1080p", "2160p"]
        );
        // Native bucket reproduces the source exactly.
        let native = plan.last().unwrap();
        assert_eq!((native.width, native.height), (3840, 2160));
    }

    #[test]
    fn hd_source_stops_at_1080() {
        let plan = plan_renditions(1920, 1080);
        assert_eq!(plan.last().unwrap().name, "1080p");
        assert!(!plan.iter().any(|r| r.name == "2160p"));
    }

    #[test]
    fn portrait_orientation_uses_long_edge() {
        let plan = plan_renditions(1080, 1920);
        // Long edge 1920 qualifies for the 1080 bucket.
        assert!(plan.iter().any(|r| r.name == "1080p"));
        let r1080 = plan.iter().find(|r| r.name == "1080p").unwrap();
        assert_eq!((r1080.width, r1080.height), (608, 1080));
    }

    #[test]
    fn tiny_source_synthesizes_single_rendition() {
        let plan = plan_renditions(100, 100);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "100p");
        assert_eq!((plan[0].width, plan[0].height), (100, 100));
    }

    #[test]
    fn tiny_odd_source_is_even_clamped() {
        let plan = plan_renditions(101, 75);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].name, "75p");
        assert_eq!((plan[0].width, plan[0].height), (100, 74));
    }

    #[test]
    fn all_dimensions_are_even() {
        for &(w, h) in &[
            (3840u32, 2160u32),
            (1920, 1080),
            (1919, 1079),
            (1280, 531),
            (853, 480),
            (641, 361),
            (145, 144),
        ] {
            for r in plan_renditions(w, h) {
                assert_eq!(r.width % 2, 0, "{w}x{h} -> {} width {}", r.name, r.width);
                assert_eq!(r.height % 2, 0, "{w}x{h} -> {} height {}", r.name, r.height);
            }
        }
    }

    #[test]
    fn ladder_order_is_preserved() {
        let plan = plan_renditions(1280, 720);
        let widths: Vec<u32> = plan.iter().map(|r| r.width).collect();
        let mut sorted = widths.clone();
        sorted.sort_unstable();
        assert_eq!(widths, sorted);
    }

    #[test]
    fn aspect_ratio_preserved_within_rounding() {
        let plan = plan_renditions(1920, 800);
        let r = plan.iter().find(|r| r.name == "720p").unwrap();
        // 1920x800 scaled to long edge 720 is 720x300.
        assert_eq!((r.width, r.height), (720, 300));
    }
}
