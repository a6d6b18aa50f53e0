use mvr::nalgebra::{Affine3, Matrix4, Point3};
use mvr::optimize::IterativeConvergenceStrategy;
use mvr::pairwise::{Label, PairwiseSettings, ViewPoints};
use mvr::consensus::RansacParameters;
use mvr::{BoundingBox, Group, InterestPoint, Link, ModelKind, ViewId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An affine transform as the first three rows of its homogeneous matrix, row by row.
pub type AffineRows = [f64; 12];

pub fn affine_from_rows(rows: &AffineRows) -> Affine3<f64> {
    #[rustfmt::skip]
    let matrix = Matrix4::new(
        rows[0], rows[1], rows[2], rows[3],
        rows[4], rows[5], rows[6], rows[7],
        rows[8], rows[9], rows[10], rows[11],
        0.0, 0.0, 0.0, 1.0,
    );
    Affine3::from_matrix_unchecked(matrix)
}

pub fn rows_from_homogeneous(matrix: &Matrix4<f64>) -> AffineRows {
    let mut rows = [0.0; 12];
    for r in 0..3 {
        for c in 0..4 {
            rows[r * 4 + c] = matrix[(r, c)];
        }
    }
    rows
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkRecord<G> {
    pub a: G,
    pub b: G,
    pub bounding_box: BoundingBox,
    /// Maps coordinates of `b` into the frame of `a`.
    pub transform: AffineRows,
    #[serde(default = "default_quality")]
    pub quality: f64,
}

fn default_quality() -> f64 {
    1.0
}

impl<G> From<LinkRecord<G>> for Link<G> {
    fn from(record: LinkRecord<G>) -> Self {
        Link::new(
            record.a,
            record.b,
            record.bounding_box,
            affine_from_rows(&record.transform),
            record.quality,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointRecord {
    pub view: ViewId,
    pub label: Label,
    pub points: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    Descriptor,
    Icp,
}

impl Default for MatcherKind {
    fn default() -> Self {
        Self::Descriptor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct IcpSettings {
    pub max_distance: f64,
    pub max_iterations: usize,
}

impl Default for IcpSettings {
    fn default() -> Self {
        Self {
            max_distance: 5.0,
            max_iterations: 100,
        }
    }
}

/// Everything one registration run needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub model: ModelKind,
    pub fixed: Vec<ViewId>,
    pub groups: Vec<Group<ViewId>>,
    /// Whole-image links between views or groups of views.
    pub links: Vec<LinkRecord<Group<ViewId>>>,
    /// Links used only to join components that stay disconnected.
    pub weak_links: Vec<LinkRecord<ViewId>>,
    pub min_link_quality: f64,
    pub points: Vec<PointRecord>,
    /// The view pairs to match. All pairs of views with points when empty.
    pub pairs: Vec<(ViewId, ViewId)>,
    pub matcher: MatcherKind,
    pub ransac: RansacParameters,
    pub icp: IcpSettings,
    pub pairwise: PairwiseSettings,
    pub label_weights: BTreeMap<Label, f64>,
    pub strategy: IterativeConvergenceStrategy,
    pub concurrent: bool,
}

impl Scene {
    pub fn view_points(&self) -> ViewPoints {
        let mut view_points = ViewPoints::new();
        for record in &self.points {
            let points = view_points
                .entry(record.view)
                .or_default()
                .entry(record.label.clone())
                .or_default();
            let start = points.len();
            points.extend(
                record
                    .points
                    .iter()
                    .enumerate()
                    .map(|(ix, &[x, y, z])| InterestPoint::new(start + ix, Point3::new(x, y, z))),
            );
        }
        view_points
    }

    pub fn view_pairs(&self, view_points: &ViewPoints) -> Vec<(ViewId, ViewId)> {
        if !self.pairs.is_empty() {
            return self.pairs.clone();
        }
        let views: Vec<ViewId> = view_points.keys().copied().collect();
        views
            .iter()
            .enumerate()
            .flat_map(|(ix, &a)| views[ix + 1..].iter().map(move |&b| (a, b)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewTransform {
    pub view: ViewId,
    pub affine: AffineRows,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovedRecord {
    pub a: Vec<ViewId>,
    pub b: Vec<ViewId>,
    pub error: f64,
}

/// The outcome written back as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub transforms: Vec<ViewTransform>,
    pub components: usize,
    pub removed: Vec<RemovedRecord>,
    pub mean_error: f64,
    pub max_error: f64,
    pub converged: bool,
}
