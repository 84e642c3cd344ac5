use crate::error::ConfigError;

/// Ordered literal replacements applied to directory names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    pairs: Vec<(String, String)>,
}

impl SubstitutionTable {
    pub fn new(pairs: Vec<(String, String)>) -> Result<Self, ConfigError> {
        if let Some((_, new)) = pairs.iter().find(|(old, _)| old.is_empty()) {
            return Err(ConfigError::Substitutions(format!(
                "empty search string (replacement '{}')",
                new.escape_debug()
            )));
        }
        Ok(Self { pairs })
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Single left-to-right pass. At each position the first pair (in table
    /// order) whose search string matches wins; replaced text is not rescanned.
    pub fn apply(&self, input: &str) -> String {
        if self.pairs.is_empty() {
            return input.to_string();
        }
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        'outer: while !rest.is_empty() {
            for (old, new) in &self.pairs {
                if let Some(after) = rest.strip_prefix(old.as_str()) {
                    out.push_str(new);
                    rest = after;
                    continue 'outer;
                }
            }
            // no match here: copy one char and move on
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        out
    }
}

/// Parse `old,new,old,new,...` written as one CSV row.
///
/// Fields may be double-quoted (`""` inside quotes is a literal quote). An
/// empty spec yields an empty table.
pub fn parse_substitutions(spec: &str) -> Result<SubstitutionTable, ConfigError> {
    let spec = spec.strip_suffix('\n').map(|s| s.strip_suffix('\r').unwrap_or(s)).unwrap_or(spec);
    if spec.is_empty() {
        return Ok(SubstitutionTable::default());
    }
    let fields = parse_csv_row(spec)?;
    if fields.len() % 2 != 0 {
        return Err(ConfigError::Substitutions(format!(
            "expected old,new pairs but got {} field(s)",
            fields.len()
        )));
    }
    let pairs = fields.chunks(2).map(|p| (p[0].clone(), p[1].clone())).collect();
    SubstitutionTable::new(pairs)
}

fn parse_csv_row(row: &str) -> Result<Vec<String>, ConfigError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = row.chars().peekable();
    // start of a field: quoted or bare
    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => {
                        return Err(ConfigError::Substitutions("unterminated quoted field".into()));
                    }
                }
            }
            match chars.next() {
                None => {
                    fields.push(std::mem::take(&mut field));
                    return Ok(fields);
                }
                Some(',') => fields.push(std::mem::take(&mut field)),
                Some('\n') | Some('\r') => return Err(multiple_rows()),
                Some(c) => {
                    return Err(ConfigError::Substitutions(format!(
                        "unexpected '{}' after closing quote",
                        c
                    )));
                }
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(std::mem::take(&mut field));
                        return Ok(fields);
                    }
                    Some(',') => {
                        fields.push(std::mem::take(&mut field));
                        break;
                    }
                    Some('"') => {
                        return Err(ConfigError::Substitutions("bare '\"' in unquoted field".into()));
                    }
                    Some('\n') | Some('\r') => return Err(multiple_rows()),
                    Some(c) => field.push(c),
                }
            }
        }
    }
}

fn multiple_rows() -> ConfigError {
    ConfigError::Substitutions("only a single CSV row is supported".into())
}

/// `"JPG, .jpeg,png"` -> `["jpg", "jpeg", "png"]`, order kept, duplicates dropped.
pub fn parse_extensions(input: &str) -> Result<Vec<String>, ConfigError> {
    let mut out: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let ext = normalize_extension(raw);
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    if out.is_empty() {
        return Err(ConfigError::NoExtensions);
    }
    Ok(out)
}

pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}
