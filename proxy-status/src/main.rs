#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
mod output;

#[cfg(all(target_os = "linux", target_arch = "x86_64", target_env = "gnu"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    args::Args::parse_and_run().await
}
