use anyhow::Result;
use serde::Serialize;

use crate::opts::GlobalOpts;

pub fn print_json(opts: &GlobalOpts, value: &impl Serialize) -> Result<()> {
    let text = if opts.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
