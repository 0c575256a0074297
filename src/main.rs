use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PHOTO_GALLERY_LOG";

fn main() {
    if handle_cli_flags() {
        return;
    }

    init_logging();

    let command = match photo_gallery::cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("error: {err}\n\n{}", photo_gallery::cli::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(err) = photo_gallery::run(command) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

// Only flags ahead of the command count; later ones belong to its arguments.
fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args()
        .skip(1)
        .take_while(|arg| arg.starts_with('-'))
    {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("photo-gallery {}", photo_gallery::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{}", photo_gallery::cli::USAGE);
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
