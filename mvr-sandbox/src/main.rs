mod scene;

use log::*;
use mvr::optimize::{
    GlobalOptimizer, InterestPointMatchCreator, IterativeOptimizer, LinkMatchCreator,
    MaxErrorLinkRemoval, MetadataWeakLinkFactory, PointMatchCreator, TileGraph,
    TwoRoundOptimizer,
};
use mvr::pairwise::{compute_pairwise, CorrespondenceStore, DescriptorMatcher, IcpMatcher};
use mvr::{AnyModel, Link, ModelKind, TransformModel, ViewId};
use scene::{rows_from_homogeneous, MatcherKind, Registration, RemovedRecord, Scene, ViewTransform};
use std::collections::BTreeSet;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Clone)]
#[structopt(name = "mvr-sandbox", about = "Globally registers overlapping 3D views")]
struct Opt {
    /// The JSON scene describing views, correspondences and settings.
    #[structopt(parse(from_os_str))]
    scene: PathBuf,
    /// The file the transforms are written to as JSON.
    ///
    /// The transforms are printed to stdout if this is not given.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// Overrides the model of the scene (translation, rigid or affine).
    #[structopt(short, long)]
    model: Option<ModelKind>,
    /// The number of threads used for pairwise matching.
    #[structopt(short, long)]
    threads: Option<usize>,
    /// Refit all tiles in parallel instead of one after another.
    #[structopt(long)]
    concurrent: bool,
}

/// Connects the graph with interest point correspondences and whole-image links together.
struct Combined<'a> {
    interest: InterestPointMatchCreator<'a>,
    links: LinkMatchCreator,
}

impl PointMatchCreator for Combined<'_> {
    fn views(&self) -> BTreeSet<ViewId> {
        let mut views = self.interest.views();
        views.extend(self.links.views());
        views
    }

    fn assign_point_matches<M: TransformModel>(&self, graph: &mut TileGraph<M>) {
        self.interest.assign_point_matches(graph);
        self.links.assign_point_matches(graph);
    }
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let file = std::fs::File::open(&opt.scene).expect("failed to open scene file");
    let mut scene: Scene = serde_json::from_reader(file).expect("failed to parse scene file");
    if let Some(model) = opt.model {
        scene.model = model;
    }
    if opt.threads.is_some() {
        scene.pairwise = scene.pairwise.num_threads(opt.threads);
    }
    scene.concurrent |= opt.concurrent;
    info!(
        "loaded scene with {} links, {} weak links and {} point sets, using the {} model",
        scene.links.len(),
        scene.weak_links.len(),
        scene.points.len(),
        scene.model
    );

    let prototype = AnyModel::new(scene.model);
    let view_points = scene.view_points();
    let pairs = scene.view_pairs(&view_points);
    let mut results = if view_points.is_empty() {
        vec![]
    } else {
        let results = match scene.matcher {
            MatcherKind::Descriptor => compute_pairwise(
                &view_points,
                &pairs,
                &DescriptorMatcher::new(prototype.clone(), scene.ransac),
                &scene.pairwise,
            ),
            MatcherKind::Icp => compute_pairwise(
                &view_points,
                &pairs,
                &IcpMatcher::new(prototype.clone())
                    .max_distance(scene.icp.max_distance)
                    .max_iterations(scene.icp.max_iterations),
                &scene.pairwise,
            ),
        };
        results.expect("failed to run pairwise matching")
    };
    for result in &results {
        info!(
            "{}: {} of {} candidates are inliers, error {}",
            result.description,
            result.num_inliers(),
            result.candidates.len(),
            result.error
        );
    }
    let mut store = CorrespondenceStore::new();
    let moved = store.insert_all(results.iter_mut());
    info!("stored {} correspondences", moved);

    let interest = scene
        .label_weights
        .iter()
        .fold(InterestPointMatchCreator::new(&store), |creator, (label, &weight)| {
            creator.label_weight(label.clone(), weight)
        });
    let links = LinkMatchCreator::new(scene.links.iter().cloned().map(Link::from))
        .min_quality(scene.min_link_quality);
    let creator = Combined { interest, links };

    let global = GlobalOptimizer::new(prototype, scene.strategy.convergence)
        .fixed_views(scene.fixed.iter().copied())
        .groups(scene.groups.iter().cloned())
        .concurrent(scene.concurrent);
    let iterative = IterativeOptimizer::new(global, scene.strategy, MaxErrorLinkRemoval);
    let weak = MetadataWeakLinkFactory::new(scene.weak_links.iter().cloned().map(Link::from));
    let result = TwoRoundOptimizer::new(iterative, weak)
        .optimize(&creator)
        .expect("failed to optimize the scene");

    let (error, converged) = match &result.round_two {
        Some(round_two) => (round_two.error, round_two.converged),
        None => (result.round_one.result.error, result.round_one.converged),
    };
    let registration = Registration {
        transforms: result
            .transforms()
            .iter()
            .map(|(&view, model)| ViewTransform {
                view,
                affine: rows_from_homogeneous(&model.to_homogeneous()),
            })
            .collect(),
        components: result.components.len(),
        removed: result
            .round_one
            .removed
            .iter()
            .map(|removed| RemovedRecord {
                a: removed.views.0.iter().copied().collect(),
                b: removed.views.1.iter().copied().collect(),
                error: removed.error,
            })
            .collect(),
        mean_error: error.mean,
        max_error: error.max,
        converged,
    };
    info!(
        "registered {} views in {} components, mean error {}, converged: {}",
        registration.transforms.len(),
        registration.components,
        registration.mean_error,
        registration.converged
    );

    match &opt.output {
        Some(path) => {
            let file = std::fs::File::create(path).expect("failed to create output file");
            serde_json::to_writer_pretty(file, &registration).expect("failed to write transforms");
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &registration)
                .expect("failed to write transforms");
            println!();
        }
    }
}
