use std::{collections::HashMap, io::BufRead, path::Path};

use anyhow::Context;
use compress_io::compress::CompressIo;

// 0 based columns of the BV-BRC AMR metadata sheet
const GENOME_ID_FIELD: usize = 1;
const PHENOTYPE_FIELD: usize = 4;

/// Resistance class of a genome from the metadata sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phenotype {
    Resistant,
    Susceptible,
}

/// Genome id to phenotype map built from a BV-BRC AMR metadata sheet
#[derive(Default)]
pub struct PhenotypeTable {
    hash: HashMap<Box<str>, Phenotype>,
}

impl PhenotypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut rdr = CompressIo::new()
            .path(path)
            .bufreader()
            .with_context(|| format!("Could not open metadata file {}", path.display()))?;
        let tbl = Self::from_reader(&mut rdr)
            .with_context(|| format!("Error reading metadata file {}", path.display()))?;
        if tbl.is_empty() {
            return Err(anyhow!(
                "Metadata file {} classified no genomes as Resistant or Susceptible",
                path.display()
            ));
        }
        info!(
            "Read phenotypes for {} genomes from {}",
            tbl.len(),
            path.display()
        );
        Ok(tbl)
    }

    fn from_reader<R: BufRead>(rdr: &mut R) -> anyhow::Result<Self> {
        let mut tbl = Self::new();
        let mut buf = String::new();
        let mut line = 0;
        loop {
            buf.clear();
            if rdr.read_line(&mut buf)? == 0 {
                break;
            }
            line += 1;
            // First line is the column header
            if line == 1 {
                continue;
            }
            let fields = split_csv_line(&buf);
            let phenotype = match fields.get(PHENOTYPE_FIELD).copied() {
                Some("Resistant") => Phenotype::Resistant,
                Some("Susceptible") => Phenotype::Susceptible,
                // Intermediate and blank calls are not usable
                _ => continue,
            };
            match fields.get(GENOME_ID_FIELD).copied() {
                Some(id) if !id.is_empty() => tbl.insert(id, phenotype),
                _ => trace!("Skipping metadata line {} with no genome id", line),
            }
        }
        Ok(tbl)
    }

    /// Classify a genome. A genome id can recur across antibiotic rows with
    /// conflicting calls; the first classification wins.
    pub fn insert(&mut self, id: &str, phenotype: Phenotype) {
        if !self.hash.contains_key(id) {
            self.hash.insert(id.to_owned().into_boxed_str(), phenotype);
        }
    }

    pub fn get(&self, id: &str) -> Option<Phenotype> {
        self.hash.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }
}

/// Split one CSV line on commas, ignoring commas inside double quoted
/// fields and stripping the surrounding quotes
fn split_csv_line(s: &str) -> Vec<&str> {
    let s = s.trim_end();
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (ix, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(s[start..ix].trim_matches('"'));
                start = ix + 1;
            }
            _ => (),
        }
    }
    fields.push(s[start..].trim_matches('"'));
    fields
}

mod test {
    #[allow(unused_imports)]
    use super::*;

    #[allow(dead_code)]
    const SHEET: &str = r#""ID","Genome ID","Genome Name","Antibiotic","Resistant Phenotype","Measurement"
"1","83332.12","Mycobacterium tuberculosis H37Rv","rifampin","Resistant","2"
"2","83332.12","Mycobacterium tuberculosis H37Rv","isoniazid","Susceptible","1"
"3","1310703.3","Klebsiella pneumoniae","meropenem","Susceptible",""
"4","562.1","Escherichia coli, strain K-12","ampicillin","Resistant","4"
"5","","no id","cefoxitin","Resistant",""
"6","99287.1","Salmonella enterica","tetracycline","Intermediate",""
"#;

    #[test]
    fn parses_sheet_and_skips_header() {
        let tbl = PhenotypeTable::from_reader(&mut SHEET.as_bytes()).unwrap();
        assert_eq!(tbl.len(), 3);
        assert_eq!(tbl.get("83332.12"), Some(Phenotype::Resistant));
        assert_eq!(tbl.get("1310703.3"), Some(Phenotype::Susceptible));
        assert_eq!(tbl.get("562.1"), Some(Phenotype::Resistant));
    }

    #[test]
    fn first_classification_wins() {
        let mut tbl = PhenotypeTable::new();
        tbl.insert("83332.12", Phenotype::Resistant);
        tbl.insert("83332.12", Phenotype::Susceptible);
        assert_eq!(tbl.get("83332.12"), Some(Phenotype::Resistant));
        assert_eq!(tbl.len(), 1);
    }

    #[test]
    fn quoted_commas_stay_in_their_field() {
        let fields = split_csv_line("\"4\",\"562.1\",\"Escherichia coli, strain K-12\",\"ampicillin\",\"Resistant\",\"4\"");
        assert_eq!(fields[GENOME_ID_FIELD], "562.1");
        assert_eq!(fields[2], "Escherichia coli, strain K-12");
        assert_eq!(fields[PHENOTYPE_FIELD], "Resistant");
    }

    #[test]
    fn non_binary_calls_are_ignored() {
        let tbl = PhenotypeTable::from_reader(&mut SHEET.as_bytes()).unwrap();
        assert_eq!(tbl.get("99287.1"), None);
    }

    #[test]
    fn unknown_genomes_miss() {
        let tbl = PhenotypeTable::from_reader(&mut SHEET.as_bytes()).unwrap();
        assert_eq!(tbl.get("562.2"), None);
    }

    #[test]
    fn windows_line_endings_are_handled() {
        let sheet = "h\r\n\"1\",\"9.9\",\"n\",\"ab\",\"Resistant\",\"1\"\r\n";
        let tbl = PhenotypeTable::from_reader(&mut sheet.as_bytes()).unwrap();
        assert_eq!(tbl.get("9.9"), Some(Phenotype::Resistant));
    }
}
