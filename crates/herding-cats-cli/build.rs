use vergen_git2::{BuildBuilder, CargoBuilder, Emitter, Git2Builder, RustcBuilder};

/// Emits the `VERGEN_*` variables read by `herding_cats::version_info`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let build_date = BuildBuilder::default().build_date(true).build()?;
    let target = CargoBuilder::default().target_triple(true).build()?;
    let commit = Git2Builder::default().sha(true).build()?;
    let compiler = RustcBuilder::default().semver(true).build()?;

    // Outside a git checkout the SHA is missing and falls back to "unknown"
    Emitter::default()
        .add_instructions(&build_date)?
        .add_instructions(&target)?
        .add_instructions(&commit)?
        .add_instructions(&compiler)?
        .emit()?;

    Ok(())
}
