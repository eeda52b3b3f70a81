// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Load IFC models and report on their contents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IFC files to load; each becomes a model named after its file stem
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// List elements whose name, GlobalId or id contains this text
    #[arg(short, long, value_name = "TEXT")]
    pub search: Option<String>,

    /// List elements of one type (`wall`, `IFCDOOR`, ...)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub element_type: Option<String>,

    /// Pick through a screen point `X,Y` in [0, 1] after fitting the view
    #[arg(short, long, value_name = "X,Y", value_parser = parse_point)]
    pub pick: Option<(f64, f64)>,

    /// Print load diagnostics
    #[arg(short, long)]
    pub diagnostics: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| (0.0..=1.0).contains(v))
            .ok_or_else(|| format!("'{}' is not a number in [0, 1]", v))
    };
    Ok((coord(x)?, coord(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("0.5, 0.25"), Ok((0.5, 0.25)));
        assert!(parse_point("0.5").is_err());
        assert!(parse_point("2,0").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["bimkit-inspect", "a.ifc", "b.ifc", "--type", "wall", "-d"]);
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.element_type.as_deref(), Some("wall"));
        assert!(args.diagnostics);
        assert!(args.search.is_none());
    }
}
