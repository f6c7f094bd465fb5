use std::env;

const DEFAULT_STEPS: u32 = 8;

fn main() {
    let steps = env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_STEPS);

    if let Err(e) = pollster::block_on(voxel_world::run(steps)) {
        log::error!("{}", e);
        std::process::exit(1)
    }
}
