#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    room_portfolio::flow::run(room_portfolio::SceneConfig::default())
}

// The web build is started through the exported `start` function
#[cfg(target_arch = "wasm32")]
fn main() {}
