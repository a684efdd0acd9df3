use std::process;

fn main() {
    env_logger::init();
    match paceloop::window::run() {
        Ok(summary) => {
            log::info!("{} frames in {:?}", summary.iterations, summary.elapsed);
            println!("Game Exited Successfully!");
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
}
