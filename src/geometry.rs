//! Box encodings and overlap measures.

/// Coordinate convention of the input boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoxFormat {
    /// `[y1, x1, y2, x2]` corner pairs.
    #[default]
    Corners,
    /// `[x_center, y_center, width, height]`.
    CenterSize,
}

impl BoxFormat {
    /// Maps the host's integer `center_point_box` flag; any non-zero value selects center form.
    pub fn from_flag(center_point_box: i32) -> Self {
        if center_point_box != 0 {
            Self::CenterSize
        } else {
            Self::Corners
        }
    }

    /// Returns the integer flag stored in serialized configurations.
    pub fn as_flag(self) -> i32 {
        match self {
            Self::Corners => 0,
            Self::CenterSize => 1,
        }
    }
}

/// Axis-aligned box in corner form.
///
/// Corners are kept as decoded; an inverted box is not reordered and simply
/// has zero area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corners {
    pub y1: f32,
    pub x1: f32,
    pub y2: f32,
    pub x2: f32,
}

impl Corners {
    /// Decodes four raw coordinates in the given convention.
    #[inline]
    pub fn decode(raw: [f32; 4], format: BoxFormat) -> Self {
        match format {
            BoxFormat::Corners => Self {
                y1: raw[0],
                x1: raw[1],
                y2: raw[2],
                x2: raw[3],
            },
            BoxFormat::CenterSize => {
                let [xc, yc, w, h] = raw;
                let half_w = w * 0.5;
                let half_h = h * 0.5;
                Self {
                    y1: yc - half_h,
                    x1: xc - half_w,
                    y2: yc + half_h,
                    x2: xc + half_w,
                }
            }
        }
    }

    /// Area, clamped to zero for degenerate or inverted boxes.
    #[inline]
    pub fn area(&self) -> f32 {
        let w = self.x2 - self.x1;
        let h = self.y2 - self.y1;
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }
}

/// Intersection-over-union with precomputed areas.
///
/// Returns 0 when either box is degenerate or the union is empty.
#[inline]
pub fn iou_with_areas(a: &Corners, area_a: f32, b: &Corners, area_b: f32) -> f32 {
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Intersection-over-union of two corner-form boxes.
pub fn iou(a: &Corners, b: &Corners) -> f32 {
    iou_with_areas(a, a.area(), b, b.area())
}

#[cfg(test)]
mod tests {
    use super::{iou, BoxFormat, Corners};

    fn corners(y1: f32, x1: f32, y2: f32, x2: f32) -> Corners {
        Corners { y1, x1, y2, x2 }
    }

    #[test]
    fn center_form_decodes_to_corners() {
        let c = Corners::decode([5.0, 2.0, 4.0, 2.0], BoxFormat::CenterSize);
        assert_eq!(c, corners(1.0, 3.0, 3.0, 7.0));
        assert!((c.area() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn flag_mapping_treats_nonzero_as_center() {
        assert_eq!(BoxFormat::from_flag(0), BoxFormat::Corners);
        assert_eq!(BoxFormat::from_flag(1), BoxFormat::CenterSize);
        assert_eq!(BoxFormat::from_flag(-3), BoxFormat::CenterSize);
        assert_eq!(BoxFormat::CenterSize.as_flag(), 1);
    }

    #[test]
    fn iou_matches_hand_computed_overlap() {
        let a = corners(0.0, 0.0, 10.0, 10.0);
        let b = corners(0.0, 5.0, 10.0, 15.0);
        // intersection 50, union 150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_boxes_have_zero_iou() {
        let a = corners(0.0, 0.0, 1.0, 1.0);
        let b = corners(2.0, 2.0, 3.0, 3.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn degenerate_boxes_have_zero_iou() {
        let point = corners(1.0, 1.0, 1.0, 1.0);
        let inverted = corners(5.0, 5.0, 0.0, 0.0);
        let normal = corners(0.0, 0.0, 5.0, 5.0);
        assert_eq!(iou(&point, &point), 0.0);
        assert_eq!(iou(&inverted, &normal), 0.0);
        assert_eq!(inverted.area(), 0.0);
    }
}
