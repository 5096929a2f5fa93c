// EKF SLAM simulation
//
// Drives a differential drive robot along an arc among a handful of
// cylindrical landmarks, feeds the estimator the commanded twists and
// simulated body-frame observations, and prints the final estimates
// against ground truth.

use nalgebra::Matrix3;

use turtle_slam::rigid2d::{DiffDrive, Pose2D, Transform2D, Twist2D, Vector2D};
use turtle_slam::slam::{Slam, TurtleMap};

const SIM_STEPS: usize = 200;
const LANDMARK_RADIUS: f64 = 0.04;

/// Body-frame observation batch of every landmark from the true pose.
fn observe(true_pose: Pose2D, landmarks: &[(f64, f64)]) -> TurtleMap {
    let t_world_body = Transform2D::new(
        Vector2D::new(true_pose.x, true_pose.y),
        true_pose.theta,
    );
    let t_body_world = t_world_body.inv();

    let mut map = TurtleMap::new();
    for (lx, ly) in landmarks {
        let center = t_body_world.apply(Vector2D::new(*lx, *ly));
        map.push(center.x, center.y, LANDMARK_RADIUS);
    }
    map
}

fn main() {
    println!("EKF SLAM simulation start");

    let landmarks: Vec<(f64, f64)> = vec![(2.0, 0.5), (1.0, 2.5), (-1.5, 1.0)];

    // per-step commanded twist: a gentle left arc
    let cmd = Twist2D::new(0.02, 0.05, 0.0);

    let mut q = Matrix3::zeros();
    q[(0, 0)] = (0.1_f64.to_radians()).powi(2);
    q[(1, 1)] = 0.001_f64.powi(2);
    q[(2, 2)] = 0.001_f64.powi(2);

    let mut r = Matrix3::zeros();
    r[(0, 0)] = 0.01_f64.powi(2);
    r[(1, 1)] = (0.5_f64.to_radians()).powi(2);

    let mut robot = DiffDrive::default();
    let mut slam = Slam::new(landmarks.len(), q, r).expect("valid noise configuration");

    for step in 0..SIM_STEPS {
        robot.feedforward(&cmd).expect("drivable twist");

        let map = observe(robot.pose(), &landmarks);

        slam.predict(&cmd).expect("prediction step");
        slam.update(&map).expect("measurement update");

        if step % 50 == 0 {
            let est = slam.robot_pose();
            println!(
                "step {:3}: est pose theta {:7.4} x {:7.4} y {:7.4}",
                step, est.theta, est.x, est.y
            );
        }
    }

    let true_pose = robot.pose();
    let est_pose = slam.robot_pose();
    println!("\nFinal robot pose:");
    println!(
        "  true: theta {:7.4} x {:7.4} y {:7.4}",
        true_pose.theta, true_pose.x, true_pose.y
    );
    println!(
        "  est:  theta {:7.4} x {:7.4} y {:7.4}",
        est_pose.theta, est_pose.x, est_pose.y
    );

    println!("\nLandmark estimates vs true positions:");
    for (i, (lx, ly)) in landmarks.iter().enumerate() {
        let est = slam.landmark(i).expect("landmark index in range");
        let err = ((est.x - lx).powi(2) + (est.y - ly).powi(2)).sqrt();
        println!(
            "  LM{}: true ({:6.3}, {:6.3}) est ({:6.3}, {:6.3}) error {:.4} m",
            i, lx, ly, est.x, est.y, err
        );
    }
}
