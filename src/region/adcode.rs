use std::fs::File;
use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result, bail};
use polars::{frame::DataFrame, io::SerReader, prelude::CsvReadOptions};
use smallvec::SmallVec;

use crate::region::RegionId;

/// Provinces whose city-level code shares only three leading digits with its districts.
pub const MUNICIPALITIES: [&str; 4] = ["北京市", "天津市", "上海市", "重庆市"];

/// Outcome of looking a name up in an [`AdcodeTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Missing,
    Unique(RegionId),
    Ambiguous(SmallVec<[RegionId; 4]>),
}

/// Outcome of narrowing ambiguous candidates by a parent prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unique(RegionId),
    /// Zero or several candidates matched; the matches are kept in table order.
    Ambiguous(Vec<RegionId>),
}

/// Name -> adcode lookup table. Names are not unique across the country,
/// so each name maps to every code that carries it, in table order.
#[derive(Debug, Clone, Default)]
pub struct AdcodeTable {
    by_name: AHashMap<String, SmallVec<[RegionId; 4]>>,
}

impl AdcodeTable {
    pub fn from_rows<S: Into<String>>(rows: impl IntoIterator<Item = (S, RegionId)>) -> Self {
        let mut by_name = AHashMap::<String, SmallVec<[RegionId; 4]>>::new();
        for (name, id) in rows {
            let ids = by_name.entry(name.into()).or_default();
            if !ids.contains(&id) { ids.push(id) }
        }
        Self { by_name }
    }

    /// Read a CSV table with an `adcode` column and a `name` (or `中文名`) column.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("[region::adcode] Failed to open adcode table: {}", path.display()))?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(file)
            .finish()
            .with_context(|| format!("[region::adcode] Failed to read adcode table from {:?}", path))?;

        Self::from_frame(&df)
    }

    /// Build from a string-typed DataFrame. Rows with a blank name or non-numeric code are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let Some(name_col) = ["name", "中文名"].into_iter().find(|col| df.column(col).is_ok()) else {
            bail!("[region::adcode] Table needs a 'name' or '中文名' column, found {:?}", df.get_column_names());
        };

        let names = df.column(name_col)?.str()
            .context("[region::adcode] Name column must be text")?;
        let codes = df.column("adcode")
            .context("[region::adcode] Table needs an 'adcode' column")?
            .str()
            .context("[region::adcode] adcode column must be read as text")?;

        let rows = names.into_iter().zip(codes.into_iter())
            .filter_map(|(name, code)| {
                let name = name?.trim();
                let id = code?.trim().parse::<RegionId>().ok()?;
                (!name.is_empty()).then(|| (name.to_string(), id))
            })
            .collect::<Vec<_>>();

        Ok(Self::from_rows(rows))
    }

    #[inline] pub fn len(&self) -> usize { self.by_name.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.by_name.is_empty() }

    pub fn lookup(&self, name: &str) -> Lookup {
        match self.by_name.get(name.trim()).map(|ids| ids.as_slice()) {
            None | Some([]) => Lookup::Missing,
            Some([id]) => Lookup::Unique(*id),
            Some(ids) => Lookup::Ambiguous(ids.iter().copied().collect()),
        }
    }
}

/// Keep the candidates whose code starts with `prefix`.
pub fn disambiguate(candidates: &[RegionId], prefix: &str) -> Resolution {
    let matches = candidates.iter().copied()
        .filter(|id| id.code().to_string().starts_with(prefix))
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [id] => Resolution::Unique(*id),
        _ => Resolution::Ambiguous(matches),
    }
}

/// Number of leading parent digits shared by a district code in `province`.
#[inline]
pub fn prefix_len(province: &str) -> usize {
    if MUNICIPALITIES.contains(&province.trim()) { 3 } else { 4 }
}

/// Prefix a district under `parent` (a city in `province`) must start with.
#[inline]
pub fn parent_prefix(province: &str, parent: RegionId) -> String {
    parent.prefix(prefix_len(province))
}
