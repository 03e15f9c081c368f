use geo::{BoundingRect, MultiPolygon};
use rstar::{AABB, RTreeObject};

/// R-tree entry: the envelope of one neighborhood, keyed by its position in the input.
#[derive(Debug, Clone)]
pub(super) struct NeighborhoodBounds {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl NeighborhoodBounds {
    /// `None` for a shape with no points, which can never hold a tract.
    pub(super) fn of(position: usize, shape: &MultiPolygon<f64>) -> Option<Self> {
        let rect = shape.bounding_rect()?;
        Some(Self { position, envelope: AABB::from_corners(rect.min().into(), rect.max().into()) })
    }

    #[inline] pub(super) fn position(&self) -> usize { self.position }
}

impl RTreeObject for NeighborhoodBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}
