//! Runs the demo table without a window: fixed 60 Hz frames through the
//! dispatcher, printing the ball's position once per second.
//!
//! Useful for eyeballing trajectories and log output:
//! `RUST_LOG=kickback=debug cargo run --example headless`

use kickback::prelude::*;

struct BallTracer {
    game: Game,
    frame: u32,
}

impl Participant for BallTracer {
    fn update(&mut self, time: &FrameTime) {
        self.game.update(time);
        self.frame += 1;
        if self.frame % 60 == 0 {
            if let Some(ball) = self.game.stage().get(self.game.ball()) {
                let p = ball.transform().position;
                let speed = ball
                    .binding()
                    .map(|b| b.linear_velocity().norm())
                    .unwrap_or(0.0);
                println!(
                    "t={:>5.1}s  ball=({:>6.1}, {:>6.1})  speed={:>5.1} px/s",
                    self.game.total_game_time(),
                    p.x,
                    p.y,
                    speed
                );
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let game = Game::new(
        GameConfig::default(),
        kickback::game::demo_assets(),
        Box::new(NullAudio),
    )?;

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Box::new(BallTracer { game, frame: 0 }));
    dispatcher.start();

    // Ten simulated seconds at a fixed 60 Hz.
    for frame in 0..=600u32 {
        dispatcher.pump(frame as f64 / 60.0);
    }

    Ok(())
}
