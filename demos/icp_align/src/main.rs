use argh::FromArgs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use pointalign::icp::{self, DistanceMetric, ICPConfig, RigidTransform};
use pointalign::cloud3d::{linalg, pointcloud::PointCloud, transforms};

#[derive(FromArgs)]
/// Align a synthetically perturbed point cloud back onto its original with ICP
struct Args {
    /// number of points of the model cloud
    #[argh(option, default = "1000")]
    num_points: usize,

    /// rotation angle of the perturbation, in radians
    #[argh(option, default = "0.1")]
    angle: f64,

    /// rotation axis of the perturbation, as `x,y,z`
    #[argh(option, default = "[0.0, 0.0, 1.0]", from_str_fn(parse_vec3))]
    axis: [f64; 3],

    /// translation of the perturbation, as `x,y,z`
    #[argh(option, default = "[0.05, 0.0, 0.0]", from_str_fn(parse_vec3))]
    translation: [f64; 3],

    /// number of far away points added to the data cloud
    #[argh(option, default = "0")]
    num_outliers: usize,

    /// path to a JSON configuration, overridden by the flags below
    #[argh(option)]
    config: Option<PathBuf>,

    /// maximum number of iterations
    #[argh(option)]
    max_iterations: Option<usize>,

    /// convergence tolerance on the change of the error
    #[argh(option)]
    tolerance: Option<f64>,

    /// fraction of the data points sampled at each iteration
    #[argh(option)]
    sampling_fraction: Option<f64>,

    /// outlier rejection threshold, in standard deviations
    #[argh(option)]
    rejection_sigma: Option<f64>,

    /// use the manhattan distance for the nearest neighbour search
    #[argh(switch)]
    manhattan: bool,

    /// seed of the point generator and the sampler
    #[argh(option)]
    seed: Option<u64>,
}

fn parse_vec3(value: &str) -> Result<[f64; 3], String> {
    let parts = value
        .split(',')
        .map(|s| s.trim().parse::<f64>().map_err(|e| format!("{s}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(format!("expected 3 comma separated values, got {}", parts.len())),
    }
}

fn load_config(args: &Args) -> Result<ICPConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ICPConfig::default(),
    };

    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    if let Some(tolerance) = args.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(sampling_fraction) = args.sampling_fraction {
        config = config.with_sampling_fraction(sampling_fraction);
    }
    if let Some(rejection_sigma) = args.rejection_sigma {
        config = config.with_rejection_sigma(rejection_sigma);
    }
    if args.manhattan {
        config = config.with_metric(DistanceMetric::Manhattan);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = load_config(&args)?;
    log::info!("Configuration: {}", serde_json::to_string(&config)?);

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    // model: random points in the unit cube
    let model = (0..args.num_points)
        .map(|_| [rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()])
        .collect::<Vec<_>>();

    // data: the model moved by the perturbation, plus the outliers
    let perturbation = RigidTransform::new(
        transforms::axis_angle_to_rotation_matrix(&args.axis, args.angle)?,
        args.translation,
    );
    let mut data = vec![[0.0; 3]; model.len()];
    linalg::transform_points(
        &model,
        &perturbation.rotation,
        &perturbation.translation,
        &mut data,
    );
    data.extend((0..args.num_outliers).map(|_| {
        [
            rng.random_range(2.0..4.0),
            rng.random_range(2.0..4.0),
            rng.random_range(2.0..4.0),
        ]
    }));

    let model = PointCloud::new(model);
    let data = PointCloud::new(data);
    println!("Model cloud: #{} points", model.len());
    println!("Data cloud: #{} points", data.len());

    let result = icp::icp_align(data, &model, config)?;

    println!("Status: {:?} after {} iterations", result.status, result.num_iterations);
    println!("Errors: {:?}", result.errors);

    let expected = perturbation.inverse();
    println!("Rotation:");
    for (row, expected_row) in result.rotation.iter().zip(expected.rotation.iter()) {
        println!("  {:>10.6?}  (expected {:>10.6?})", row, expected_row);
    }
    println!(
        "Translation: {:.6?}  (expected {:.6?})",
        result.translation, expected.translation
    );

    // composing the perturbation with the estimate should give the identity
    let closure = perturbation.then(&result.transform());
    println!(
        "Rotation error: {:.3e} rad, translation error: {:.3e}",
        transforms::rotation_angle(&closure.rotation),
        linalg::norm3(&closure.translation)
    );

    Ok(())
}
