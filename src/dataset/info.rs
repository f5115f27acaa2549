//! Human-readable dataset summaries.
//!
//! Renders the array-dimension and world-dimension tables plus the
//! pixel/world correlation matrix from the WCS capability contract alone.

use std::cmp::max;
use std::fmt::Write as _;

use crate::{dataset::Dataset, wcs::Wcs};

/// Render the summary for one dataset, or for a tiled collection when
/// `tile_shape` is given (in which case `ds` is the representative tile).
pub(crate) fn dataset_info_str(ds: &Dataset, tile_shape: Option<(usize, usize)>) -> String {
    let wcs = ds.wcs();
    let mut s = String::new();

    let instr = match ds.inventory().get("instrument").and_then(|v| v.as_str()) {
        Some(name) => format!("{name} "),
        None => String::new(),
    };

    if let Some((rows, columns)) = tile_shape {
        let _ = writeln!(
            s,
            "This TiledDataset consists of an array of ({rows}, {columns}) Dataset objects\n"
        );
        let _ = writeln!(
            s,
            "Each {instr}Dataset has {} pixel and {} world dimensions\n",
            wcs.pixel_n_dim, wcs.world_n_dim
        );
    } else {
        let _ = writeln!(
            s,
            "This {instr}Dataset consists of {} frames.",
            ds.files().filenames().len()
        );
        match ds.files().basepath() {
            Some(basepath) => {
                let _ = writeln!(s, "Files are stored in {}", basepath.display());
            }
            None => {
                let _ = writeln!(s, "Files are not yet associated with a directory.");
            }
        }
        let _ = writeln!(
            s,
            "\nThis {instr}Dataset has {} pixel and {} world dimensions\n",
            wcs.pixel_n_dim, wcs.world_n_dim
        );
        let _ = writeln!(
            s,
            "The data are represented by a lazy array of shape {:?}, loading {} chunks of shape {:?}\n",
            ds.files().output_shape(),
            ds.files().filenames().len(),
            ds.files().frame_shape(),
        );
    }

    write_array_dim_table(&mut s, wcs);
    write_world_dim_table(&mut s, wcs);
    write_correlation_matrix(&mut s, wcs);

    // No trailing whitespace on any line.
    let mut out = String::with_capacity(s.len());
    for line in s.lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn write_array_dim_table(s: &mut String, wcs: &Wcs) {
    let pixel_shape = wcs.pixel_shape.clone().unwrap_or_default();

    let dim_width = max(9, wcs.pixel_n_dim.to_string().len());
    let name_width = max(
        9,
        (0..wcs.pixel_n_dim)
            .map(|i| wcs.pixel_axis_name(i).len())
            .max()
            .unwrap_or(0),
    );
    let size_width = max(
        9,
        pixel_shape
            .iter()
            .map(|n| n.to_string().len())
            .max()
            .unwrap_or(0),
    );

    let _ = writeln!(
        s,
        "{:<dim_width$}  {:<name_width$}  {:<size_width$}  Bounds",
        "Array Dim", "Axis Name", "Data size",
    );
    for ipix in 0..wcs.pixel_n_dim {
        // Axis name lists follow the world-order convention; display reversed.
        let name = wcs.pixel_axis_name(wcs.pixel_n_dim - 1 - ipix);
        let size = match pixel_shape.get(wcs.pixel_n_dim - 1 - ipix) {
            Some(n) => format!("{n:>size_width$}"),
            None => format!("{:>size_width$}", "None"),
        };
        let bounds = match &wcs.pixel_bounds {
            Some(bounds) => format!("{:?}", bounds[wcs.pixel_n_dim - 1 - ipix]),
            None => "None".to_string(),
        };
        let _ = writeln!(s, "{ipix:>dim_width$}  {name:<name_width$}  {size}  {bounds}");
    }
    s.push('\n');
}

fn write_world_dim_table(s: &mut String, wcs: &Wcs) {
    let dim_width = max(9, wcs.world_n_dim.to_string().len());
    let name_width = max(
        9,
        (0..wcs.world_n_dim)
            .map(|i| wcs.world_axis_name(i).len())
            .max()
            .unwrap_or(0),
    );
    let type_width = max(
        13,
        (0..wcs.world_n_dim)
            .map(|i| wcs.world_axis_physical_type(i).len())
            .max()
            .unwrap_or(0),
    );

    let _ = writeln!(
        s,
        "{:<dim_width$}  {:<name_width$}  {:<type_width$}  Units",
        "World Dim", "Axis Name", "Physical Type",
    );
    for iwrl in 0..wcs.world_n_dim {
        let axis = wcs.world_n_dim - 1 - iwrl;
        let _ = writeln!(
            s,
            "{iwrl:>dim_width$}  {:<name_width$}  {:<type_width$}  {}",
            wcs.world_axis_name(axis),
            wcs.world_axis_physical_type(axis),
            wcs.world_axis_unit(axis),
        );
    }
    s.push('\n');
}

fn write_correlation_matrix(s: &mut String, wcs: &Wcs) {
    let _ = writeln!(s, "Correlation between pixel and world axes:\n");

    let row_width = max(
        16,
        (0..wcs.world_n_dim)
            .map(|i| wcs.world_axis_name(i).len())
            .max()
            .unwrap_or(0),
    );
    let col_widths: Vec<usize> = (0..wcs.pixel_n_dim)
        .map(|i| max(1, wcs.pixel_axis_name(i).len()))
        .collect();

    let mut header = format!("{:>row_width$}", "WORLD DIMENSIONS");
    for (ipix, width) in col_widths.iter().enumerate() {
        let _ = write!(header, " | {:^width$}", wcs.pixel_axis_name(ipix));
    }
    let _ = writeln!(s, "{header}");

    let mut rule = "-".repeat(row_width);
    for width in &col_widths {
        let _ = write!(rule, " | {}", "-".repeat(*width));
    }
    let _ = writeln!(s, "{rule}");

    for (iwrl, row) in wcs.axis_correlation_matrix.iter().enumerate() {
        let mut line = format!("{:>row_width$}", wcs.world_axis_name(iwrl));
        for (ipix, width) in col_widths.iter().enumerate() {
            let mark = if row.get(ipix).copied().unwrap_or(false) {
                "x"
            } else {
                ""
            };
            let _ = write!(line, " | {mark:^width$}");
        }
        let _ = writeln!(s, "{line}");
    }
}
