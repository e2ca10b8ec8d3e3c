use log::info;
use phys_space::{
    CollisionEvent, CollisionShape, RigidBody, SimulationSpace, SpaceConfig, StepContext, TickListener, Vector3,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Counts sub-steps
struct StepCounter {
    steps: AtomicUsize,
}

impl TickListener for StepCounter {
    fn pre_tick(&self, _ctx: &mut StepContext<'_>, _time_step: f32) {}

    fn post_tick(&self, _ctx: &mut StepContext<'_>, _time_step: f32) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> phys_space::Result<()> {
    env_logger::init();

    // Create a space with Earth gravity on the bundled kernel
    let space = SimulationSpace::with_reference_kernel(SpaceConfig::default())?;

    // Create a floor
    let floor = RigidBody::new_static(
        CollisionShape::cuboid(Vector3::new(20.0, 0.5, 20.0)),
        Vector3::new(0.0, -0.5, 0.0),
    );
    space.add(Arc::new(floor))?;

    // Drop five balls from increasing heights
    let balls: Vec<Arc<RigidBody>> = (0..5)
        .map(|i| {
            let position = Vector3::new(i as f32 * 3.0 - 6.0, 2.0 + i as f32 * 2.0, 0.0);
            Arc::new(RigidBody::new_dynamic(CollisionShape::sphere(0.5), 1.0, position))
        })
        .collect();
    for ball in &balls {
        space.add(Arc::clone(ball))?;
    }

    let contacts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&contacts);
    space.add_collision_listener(Arc::new(move |_: &CollisionEvent| {
        counter.fetch_add(1, Ordering::Relaxed);
    }));

    let ticks = Arc::new(StepCounter {
        steps: AtomicUsize::new(0),
    });
    space.add_tick_listener(ticks.clone());

    // A second thread drops one more ball; it lands in the space at the next step
    let remote = Arc::clone(&space);
    thread::spawn(move || {
        let late = RigidBody::new_dynamic(CollisionShape::sphere(0.5), 1.0, Vector3::new(6.0, 12.0, 0.0));
        remote.add(Arc::new(late))
    })
    .join()
    .expect("spawner thread panicked")?;

    let frame = 1.0 / 30.0;
    for frame_index in 0..120 {
        space.update(frame);
        space.distribute_events();

        if frame_index % 30 == 0 {
            println!("t = {:.1}s", frame_index as f32 * frame);
            for (i, ball) in balls.iter().enumerate() {
                let position = ball.physics_location();
                let velocity = ball.linear_velocity();
                println!(
                    "  Ball {}: Pos=({:.2}, {:.2}, {:.2}), Vel=({:.2}, {:.2}, {:.2})",
                    i + 1,
                    position.x,
                    position.y,
                    position.z,
                    velocity.x,
                    velocity.y,
                    velocity.z
                );
            }
        }
    }

    info!(
        "{} sub-steps, {} contact events, {} objects",
        ticks.steps.load(Ordering::Relaxed),
        contacts.load(Ordering::Relaxed),
        space.object_count()
    );

    // Empty the space before destroying it
    for ball in space.rigid_bodies() {
        space.remove(ball)?;
    }
    space.destroy();
    Ok(())
}
