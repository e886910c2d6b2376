use open_space_planner::util::rot2d;
use open_space_planner::{HybridAStar, PlannerConfig, Vec2d, VehicleParam};
use rerun::external::glam::Vec2;
use std::time::Instant;

const TYRE_RADIUS: f64 = 0.4; // [m] drawn wheel half length
const TYRE_WIDTH: f64 = 0.4; // [m] drawn wheel width

fn draw_car(
    x: f64,
    y: f64,
    phi: f64,
    steer: f64,
    vehicle: &VehicleParam,
    rec: &rerun::RecordingStream,
) {
    let rf = vehicle.length - vehicle.back_edge_to_center;
    let rb = vehicle.back_edge_to_center;
    let half_w = vehicle.width / 2.0;
    let track = 0.8 * vehicle.width;
    let body = [
        [-rb, half_w],
        [-rb, -half_w],
        [rf, -half_w],
        [rf, half_w],
        [-rb, half_w],
    ];
    let wheel = [
        [-TYRE_RADIUS, TYRE_WIDTH / 4.0],
        [-TYRE_RADIUS, -TYRE_WIDTH / 4.0],
        [TYRE_RADIUS, -TYRE_WIDTH / 4.0],
        [TYRE_RADIUS, TYRE_WIDTH / 4.0],
        [-TYRE_RADIUS, TYRE_WIDTH / 4.0],
    ];

    let to_world = |points: Vec<(f64, f64)>| -> Vec<Vec2> {
        points
            .into_iter()
            .map(|p| rot2d(&[p.0, p.1], phi))
            .map(|p| Vec2::new((p.0 + x) as f32, (p.1 + y) as f32))
            .collect()
    };

    let steered: Vec<(f64, f64)> = wheel.iter().map(|p| rot2d(p, steer)).collect();
    let fr_wheel = to_world(
        steered
            .iter()
            .map(|p| (p.0 + vehicle.wheel_base, p.1 - track / 2.0))
            .collect(),
    );
    let fl_wheel = to_world(
        steered
            .iter()
            .map(|p| (p.0 + vehicle.wheel_base, p.1 + track / 2.0))
            .collect(),
    );
    let rr_wheel = to_world(wheel.iter().map(|p| (p[0], p[1] - track / 2.0)).collect());
    let rl_wheel = to_world(wheel.iter().map(|p| (p[0], p[1] + track / 2.0)).collect());
    let body = to_world(body.iter().map(|p| (p[0], p[1])).collect());

    let _ = rec.log("car/body", &rerun::LineStrips2D::new([body]));
    let _ = rec.log("car/fr_wheel", &rerun::LineStrips2D::new([fr_wheel]));
    let _ = rec.log("car/fl_wheel", &rerun::LineStrips2D::new([fl_wheel]));
    let _ = rec.log("car/rr_wheel", &rerun::LineStrips2D::new([rr_wheel]));
    let _ = rec.log("car/rl_wheel", &rerun::LineStrips2D::new([rl_wheel]));
}

fn slalom_obstacles() -> Vec<Vec<Vec2d>> {
    vec![
        // lower wall
        vec![Vec2d::new(18.0, 0.0), Vec2d::new(18.0, 15.0)],
        // upper wall
        vec![Vec2d::new(28.0, 25.0), Vec2d::new(28.0, 9.0)],
        // parked box near the goal, closed ring
        vec![
            Vec2d::new(33.0, 0.0),
            Vec2d::new(36.0, 0.0),
            Vec2d::new(36.0, 4.0),
            Vec2d::new(33.0, 4.0),
            Vec2d::new(33.0, 0.0),
        ],
    ]
}

fn main() {
    env_logger::init();
    let rec = rerun::RecordingStreamBuilder::new("open-space-planner")
        .spawn()
        .unwrap();
    rec.set_time_seconds("step", 0.);

    let config = PlannerConfig::default();
    let vehicle = config.vehicle;
    let mut planner = HybridAStar::new(config);

    let xy_bounds = [0.0, 40.0, 0.0, 25.0];
    let (sx, sy, sphi) = (8.0, 12.0, 0.0);
    let (ex, ey, ephi) = (33.0, 7.0, 0.0);
    let obstacles = slalom_obstacles();

    let _ = rec.log(
        "start",
        &rerun::Points2D::new([Vec2::new(sx as f32, sy as f32)]),
    );
    let _ = rec.log(
        "goal",
        &rerun::Points2D::new([Vec2::new(ex as f32, ey as f32)]),
    );
    for (i, polyline) in obstacles.iter().enumerate() {
        let strip: Vec<Vec2> = polyline
            .iter()
            .map(|v| Vec2::new(v.x as f32, v.y as f32))
            .collect();
        let _ = rec.log(
            format!("obstacles/{i}"),
            &rerun::LineStrips2D::new([strip]),
        );
    }

    println!("hybrid astar start!");
    let t0 = Instant::now();
    let planned = planner.plan(sx, sy, sphi, ex, ey, ephi, xy_bounds, &obstacles);
    println!("running T: {:?}", t0.elapsed());

    match planned {
        Ok(result) => {
            println!("Done! {} states", result.x.len());
            let line: Vec<Vec2> = result
                .x
                .iter()
                .zip(result.y.iter())
                .map(|(&a, &b)| Vec2::new(a as f32, b as f32))
                .collect();
            let _ = rec.log("path", &rerun::LineStrips2D::new([line]));

            for k in 0..result.x.len() {
                rec.set_time_seconds("step", k as f64);
                let steer = if k < result.steer.len() {
                    result.steer[k]
                } else {
                    0.0
                };
                draw_car(result.x[k], result.y[k], result.phi[k], steer, &vehicle, &rec);
            }
        }
        Err(err) => {
            println!("Searching failed: {err}");
        }
    }
}
