//! Native command-line front end.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::time::Duration;

    use anyhow::{Context, anyhow, bail};
    use clap::{Args, Parser, Subcommand};
    use futures::executor::LocalPool;
    use web_time::Instant;

    use framescrub::state::NativeDecoderThread;
    use framescrub::{
        AppConfig, BufferConfig, FrameBufferSession, FrameSource, Mask, MaskStore, ObjectRegistry,
        OverlayCompositor, Viewport,
    };

    /// Frame scrubber
    ///
    /// Decode, overlay and play back folders of extracted video frames.
    #[derive(Parser, Debug)]
    #[command(name = "framescrub", version)]
    pub struct Opt {
        /// Configuration file (defaults to the user config directory)
        #[arg(long, global = true)]
        pub config: Option<PathBuf>,

        /// Override the configured log level (error, warn, info, debug, trace)
        #[arg(long, global = true, value_parser = parse_level)]
        pub log_level: Option<log::LevelFilter>,

        #[command(subcommand)]
        pub mode: Mode,
    }

    #[derive(Subcommand, Debug)]
    pub enum Mode {
        /// Decode one frame, composite masks over it and write a PNG.
        Render(Render),

        /// Map a click in a display container to normalized image coordinates.
        Probe(Probe),

        /// Play a folder cyclically and report what the buffer does.
        Play(Play),
    }

    #[derive(Args, Debug)]
    pub struct Render {
        /// Folder of frame images
        pub folder: PathBuf,

        /// Frame index to render
        #[arg(long, default_value_t = 0)]
        pub frame: usize,

        /// Mask to overlay, as CLASS=PATH (repeatable, drawn in order)
        #[arg(long = "mask", value_parser = parse_mask_arg)]
        pub masks: Vec<(String, PathBuf)>,

        /// Output PNG path
        #[arg(long, short)]
        pub output: PathBuf,
    }

    #[derive(Args, Debug)]
    pub struct Probe {
        /// Container size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        pub container: (u32, u32),

        /// Image size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        pub image: (u32, u32),

        /// Click position in container pixels
        pub x: f32,
        pub y: f32,
    }

    #[derive(Args, Debug)]
    pub struct Play {
        /// Folder of frame images
        pub folder: PathBuf,

        /// How long to play, in seconds
        #[arg(long, default_value_t = 5.0)]
        pub seconds: f64,

        /// Playback rate (overrides the config)
        #[arg(long)]
        pub fps: Option<u32>,
    }

    fn parse_size(s: &str) -> Result<(u32, u32), String> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
        let w = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
        let h = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
        Ok((w, h))
    }

    fn parse_level(s: &str) -> Result<log::LevelFilter, String> {
        s.parse()
            .map_err(|_| format!("unknown log level '{s}'"))
    }

    fn parse_mask_arg(s: &str) -> Result<(String, PathBuf), String> {
        let (class, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected CLASS=PATH, got '{s}'"))?;
        if class.is_empty() || path.is_empty() {
            return Err(format!("expected CLASS=PATH, got '{s}'"));
        }
        Ok((class.to_string(), PathBuf::from(path)))
    }

    fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
        match path {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display())),
            None => Ok(AppConfig::load_from_default_path().unwrap_or_default()),
        }
    }

    fn init_logging(level: log::LevelFilter) {
        let env = env_logger::Env::default().default_filter_or(level.as_str());
        env_logger::Builder::from_env(env).init();
    }

    pub fn run() -> anyhow::Result<()> {
        let opt = Opt::parse();
        let config = load_config(opt.config.as_ref())?;
        init_logging(
            opt.log_level
                .unwrap_or_else(|| config.log_level.to_level_filter()),
        );

        match opt.mode {
            Mode::Render(args) => render(&config, args),
            Mode::Probe(args) => probe(args),
            Mode::Play(args) => play(&config, args),
        }
    }

    fn render(config: &AppConfig, args: Render) -> anyhow::Result<()> {
        let source = FrameSource::from_folder(&args.folder)?;
        let frame_count = source.len();
        if args.frame >= frame_count {
            bail!(
                "frame {} out of range: '{}' has {} frames",
                args.frame,
                source.name(),
                frame_count
            );
        }

        // Only the requested frame is needed
        let buffer = BufferConfig {
            prefetch_radius: 0,
            ..config.to_buffer_config()
        };
        let mut pool = LocalPool::new();
        let decoder = NativeDecoderThread::spawn()?;
        let mut session = FrameBufferSession::new(decoder, pool.spawner(), buffer);
        session.open(source);
        session.seek(args.frame);
        let bitmap = pool
            .run_until(session.request(args.frame))
            .ok_or_else(|| anyhow!("failed to decode frame {}", args.frame))?;

        let mut objects = ObjectRegistry::new();
        let mut masks = MaskStore::new();
        for (class, path) in &args.masks {
            let image = image::open(path)
                .with_context(|| format!("loading mask {}", path.display()))?;
            let id = objects.create(&format!("{} {}", class, objects.len() + 1), 0, class);
            masks.save_mask(args.frame, id, Mask::from_dynamic(&image));
        }

        let compositor = OverlayCompositor::new(config.overlay.mask_alpha);
        let composite = compositor.compose_frame(bitmap.image(), &objects, &masks, args.frame);
        composite
            .save(&args.output)
            .with_context(|| format!("writing {}", args.output.display()))?;

        log::info!(
            "Rendered frame {} with {} masks to {}",
            args.frame,
            masks.len(),
            args.output.display()
        );
        session.close();
        Ok(())
    }

    fn probe(args: Probe) -> anyhow::Result<()> {
        let (cw, ch) = args.container;
        let (iw, ih) = args.image;
        let viewport = Viewport::aspect_fit(cw as f32, ch as f32, iw, ih)
            .ok_or_else(|| anyhow!("container and image sizes must be non-zero"))?;

        println!(
            "display {:.3}x{:.3} at offset ({:.3}, {:.3})",
            viewport.display_width, viewport.display_height, viewport.offset_x, viewport.offset_y
        );
        match viewport.display_to_normalized(args.x, args.y) {
            Some(point) => {
                let (x, y) = viewport.normalized_to_display(point);
                println!("normalized ({:.4}, {:.4})", point.x, point.y);
                println!("round trip ({:.3}, {:.3})", x, y);
            }
            None => println!("outside image"),
        }
        Ok(())
    }

    /// Negative, non-finite and overflowing durations are rejected.
    fn play_duration(seconds: f64) -> anyhow::Result<Duration> {
        Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("invalid play duration {seconds} s"))
    }

    fn play(config: &AppConfig, args: Play) -> anyhow::Result<()> {
        let source = FrameSource::from_folder(&args.folder)?;
        let mut buffer = config.to_buffer_config();
        if let Some(fps) = args.fps {
            buffer.fps = fps;
        }

        let mut pool = LocalPool::new();
        let decoder = NativeDecoderThread::spawn()?;
        let mut session = FrameBufferSession::new(decoder, pool.spawner(), buffer);
        session.open(source);

        let start = Instant::now();
        let deadline = start + play_duration(args.seconds)?;
        session.play(start);

        let mut shown = 0usize;
        let mut waiting = 0usize;
        while Instant::now() < deadline {
            let now = Instant::now();
            if let Some(frame) = session.tick(now) {
                if session.is_ready() {
                    shown += 1;
                    log::debug!("Showing frame {}", frame);
                } else {
                    waiting += 1;
                    log::debug!("Frame {} not ready, showing placeholder", frame);
                }
            }
            session.take_arrivals();
            pool.run_until_stalled();
            std::thread::sleep(Duration::from_millis(2));
        }

        let stats = session.stats();
        println!(
            "played {} frames ({} placeholders) at {} fps; cursor {}/{}; resident {}/{}; in flight {}",
            shown,
            waiting,
            session.playback().fps(),
            stats.cursor,
            stats.frame_count,
            stats.resident,
            stats.capacity,
            stats.inflight
        );
        session.close();
        Ok(())
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    cli::run()
}

// The library has no browser entry point
#[cfg(target_arch = "wasm32")]
fn main() {}
