//! # Input Table Readers
//!
//! All inputs are tab-delimited with one header line. Count and PLAF
//! tables carry `CHROM POS VALUE` rows; the panel table carries `CHROM
//! POS` followed by one 0/1 column per reference haplotype.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{DeconvError, Result};

/// One `CHROM POS VALUE` table in flattened locus order.
#[derive(Debug, Clone)]
pub struct MarkerTable {
    pub chrom: Vec<String>,
    pub pos: Vec<u64>,
    pub value: Vec<f64>,
}

impl MarkerTable {
    /// Read a counts or PLAF file.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut chrom = Vec::new();
        let mut pos = Vec::new();
        let mut value = Vec::new();

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line_idx == 0 || line.trim().is_empty() {
                continue;
            }
            let line_no = line_idx + 1;
            let mut fields = line.split('\t');

            let c = fields
                .next()
                .ok_or_else(|| DeconvError::parse(line_no, "missing CHROM field"))?;
            let p = fields
                .next()
                .ok_or_else(|| DeconvError::parse(line_no, "missing POS field"))?;
            let v = fields
                .next()
                .ok_or_else(|| DeconvError::parse(line_no, "missing value field"))?;

            chrom.push(c.to_string());
            pos.push(p.parse::<u64>().map_err(|e| {
                DeconvError::parse(line_no, format!("bad position {:?}: {}", p, e))
            })?);
            value.push(v.parse::<f64>().map_err(|e| {
                DeconvError::parse(line_no, format!("bad value {:?}: {}", v, e))
            })?);
        }

        if chrom.is_empty() {
            return Err(DeconvError::invalid_input(format!(
                "{} contains no data rows",
                path.display()
            )));
        }

        Ok(Self { chrom, pos, value })
    }

    pub fn n_loci(&self) -> usize {
        self.chrom.len()
    }

    /// Split the flattened loci into maximal runs sharing a chromosome name.
    ///
    /// Returns the segment chromosome names and per-segment positions.
    pub fn group_by_chrom(&self) -> (Vec<String>, Vec<Vec<u64>>) {
        let mut names: Vec<String> = Vec::new();
        let mut positions: Vec<Vec<u64>> = Vec::new();

        for (c, &p) in self.chrom.iter().zip(self.pos.iter()) {
            if names.last().map(|n| n == c) == Some(true) {
                positions.last_mut().unwrap().push(p);
            } else {
                names.push(c.clone());
                positions.push(vec![p]);
            }
        }
        (names, positions)
    }
}

/// A reference panel table: haplotype bits per locus plus the locus labels
/// used to check alignment against the sample data.
#[derive(Debug, Clone)]
pub struct PanelTable {
    pub chrom: Vec<String>,
    pub pos: Vec<u64>,
    /// `bits[locus][haplotype]`
    pub bits: Vec<Vec<u8>>,
}

impl PanelTable {
    /// Read a panel file. Every data row must carry the same number of
    /// haplotype columns, each 0 or 1.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut chrom = Vec::new();
        let mut pos = Vec::new();
        let mut bits: Vec<Vec<u8>> = Vec::new();
        let mut n_haps: Option<usize> = None;

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line_idx == 0 || line.trim().is_empty() {
                continue;
            }
            let line_no = line_idx + 1;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                return Err(DeconvError::parse(
                    line_no,
                    "panel row needs CHROM, POS and at least one haplotype column",
                ));
            }

            chrom.push(fields[0].to_string());
            pos.push(fields[1].parse::<u64>().map_err(|e| {
                DeconvError::parse(line_no, format!("bad position {:?}: {}", fields[1], e))
            })?);

            let row: Vec<u8> = fields[2..]
                .iter()
                .map(|f| match f.trim() {
                    "0" => Ok(0u8),
                    "1" => Ok(1u8),
                    other => Err(DeconvError::parse(
                        line_no,
                        format!("panel entry {:?} is not 0 or 1", other),
                    )),
                })
                .collect::<Result<_>>()?;

            match n_haps {
                None => n_haps = Some(row.len()),
                Some(n) if n != row.len() => {
                    return Err(DeconvError::parse(
                        line_no,
                        format!("expected {} haplotype columns, found {}", n, row.len()),
                    ));
                }
                _ => {}
            }
            bits.push(row);
        }

        if bits.is_empty() {
            return Err(DeconvError::invalid_input(format!(
                "{} contains no data rows",
                path.display()
            )));
        }

        Ok(Self { chrom, pos, bits })
    }
}
