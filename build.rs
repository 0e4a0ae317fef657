use vergen_gix::{Emitter, GixBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Git sha and commit date for `cli-recipe --version`.  Outside a git checkout vergen emits
    // placeholder values, which the version printer recognizes and omits.
    let gix = GixBuilder::default().sha(true).commit_date(true).build()?;

    Emitter::default().add_instructions(&gix)?.emit()?;

    Ok(())
}
