#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use ballpit::{Backend, BallpitConfig, Engine, FrameUniforms, Mesh, Viewport};
    use clap::Parser;
    use nalgebra::Vector2;

    /// Run the ball pit without a display and report how the spheres settle.
    #[derive(Parser)]
    #[command(name = "ballpit", about = "Headless ball-pit simulation", long_about = None)]
    struct Cli {
        /// Number of spheres
        #[arg(short, long, default_value_t = ballpit::config::DEFAULT_COUNT)]
        count: usize,
        /// Frames to simulate
        #[arg(short, long, default_value_t = 600)]
        frames: u32,
        /// Surface width in CSS pixels
        #[arg(long, default_value_t = 1280.0)]
        width: f32,
        /// Surface height in CSS pixels
        #[arg(long, default_value_t = 720.0)]
        height: f32,
        /// RNG seed for the initial layout
        #[arg(short, long)]
        seed: Option<u64>,
        /// Steer sphere 0 around a circle with a simulated pointer
        #[arg(long)]
        orbit: bool,
    }

    #[derive(Default)]
    struct CountingBackend {
        uploads: usize,
        draws: usize,
    }

    impl Backend for CountingBackend {
        fn prepare(&mut self, mesh: &Mesh, capacity: usize) {
            log::debug!("mesh with {} vertices, {} instances", mesh.vertex_count(), capacity);
        }
        fn upload_matrices(&mut self, _matrices: &[f32]) { self.uploads += 1; }
        fn upload_colors(&mut self, _colors: &[f32]) { self.uploads += 1; }
        fn resize(&mut self, viewport: &Viewport) {
            log::debug!("viewport {:?}", viewport);
        }
        fn draw(&mut self, _uniforms: &FrameUniforms) { self.draws += 1; }
        fn dispose(&mut self) {}
    }

    const FRAME_MS: f64 = 1000.0 / 60.0;

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let cli = Cli::parse();

        let mut config = BallpitConfig::default();
        config.theme.sim.count = cli.count;
        config.theme.sim.seed = cli.seed;
        let mut engine = Engine::new(CountingBackend::default(), config);
        let viewport = engine.resize(cli.width, cli.height, 1.0)?;
        log::info!("world box {:.2} x {:.2}", viewport.w_width, viewport.w_height);

        engine.set_intersecting(true, 0.0);
        for i in 1..=cli.frames {
            if cli.orbit {
                let a = i as f32 * 0.02;
                engine.pointer_moved(Vector2::new(a.cos() * 0.5, a.sin() * 0.5));
            }
            engine.frame(i as f64 * FRAME_MS);
        }

        let buffers = engine.physics().buffers();
        let sim = engine.physics().config();
        let n = buffers.len();
        let mut speed = 0.0;
        let mut escaped = 0;
        for slot in 0..n {
            speed += buffers.velocity(slot).norm();
            let p = buffers.position(slot);
            let r = buffers.size(slot);
            if p.x.abs() > sim.max_x + r || p.y.abs() > sim.max_y + r || p.z.abs() > sim.max_z + r {
                escaped += 1;
            }
        }
        let mean_speed = if n == 0 { 0.0 } else { speed / n as f32 };

        if let Some(backend) = engine.backend() {
            log::info!("{} frames, {} draws, {} uploads", engine.frames(), backend.draws, backend.uploads);
        }
        log::info!("mean speed {:.4}, {} of {} spheres outside the box", mean_speed, escaped, n);
        engine.dispose();
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    headless::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
