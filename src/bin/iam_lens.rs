use {
    clap::Parser,
    iam_lens::cli::{run, Cli},
    std::process::exit,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    exit(run(Cli::parse()));
}
