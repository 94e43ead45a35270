use std::fmt;

use anyhow::{Context, Result, bail};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// A single substitution step. Rules are applied in order and each one sees
/// the text produced by the previous one.
#[derive(Debug, Clone)]
pub enum Rule {
    Literal {
        from: String,
        to: String,
    },
    Pattern {
        regex: Regex,
        template: String,
        unless_followed_by: Option<Regex>,
    },
    /// Nested rules that only run while none of `absent` occurs in the
    /// lower-cased text.
    Unless {
        absent: Vec<String>,
        rules: Vec<Rule>,
    },
}

impl Rule {
    pub fn literal(from: impl Into<String>, to: impl Into<String>) -> Result<Self> {
        let from = from.into();
        if from.is_empty() {
            bail!("literal rule requires a non-empty match string");
        }
        Ok(Self::Literal {
            from,
            to: to.into(),
        })
    }

    /// Compile a regex rule. `template` accepts `\1` style back-references as
    /// well as the `$1` / `${name}` forms.
    pub fn pattern(pattern: &str, template: &str) -> Result<Self> {
        compile_pattern(pattern, template, None)
    }

    /// Like [`Rule::pattern`], but a match is kept as-is when the text right
    /// after it matches `guard`.
    pub fn guarded_pattern(pattern: &str, template: &str, guard: &str) -> Result<Self> {
        compile_pattern(pattern, template, Some(guard))
    }

    pub fn unless_present<S: AsRef<str>>(absent: &[S], rules: Vec<Rule>) -> Self {
        Self::Unless {
            absent: absent
                .iter()
                .map(|word| word.as_ref().to_lowercase())
                .collect(),
            rules,
        }
    }

    /// Apply this rule to `text`, returning the rewritten text and the number
    /// of substitutions made.
    pub fn apply(&self, text: &str) -> (String, usize) {
        match self {
            Self::Literal { from, to } => {
                let count = text.matches(from.as_str()).count();
                if count == 0 {
                    (text.to_string(), 0)
                } else {
                    (text.replace(from.as_str(), to), count)
                }
            }
            Self::Pattern {
                regex,
                template,
                unless_followed_by,
            } => apply_pattern(regex, template, unless_followed_by.as_ref(), text),
            Self::Unless { absent, rules } => {
                let lowered = text.to_lowercase();
                if absent.iter().any(|word| lowered.contains(word.as_str())) {
                    return (text.to_string(), 0);
                }
                fold_rules(rules, text)
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { from, to } => write!(f, "literal {from:?} -> {to:?}"),
            Self::Pattern {
                regex,
                template,
                unless_followed_by,
            } => {
                write!(f, "pattern /{}/ -> {template:?}", regex.as_str())?;
                if let Some(guard) = unless_followed_by {
                    write!(f, " unless followed by /{}/", guard.as_str())?;
                }
                Ok(())
            }
            Self::Unless { absent, rules } => {
                write!(f, "unless text contains {absent:?}: [")?;
                for (index, rule) in rules.iter().enumerate() {
                    if index > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{rule}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Ordered list of rules applied as a fold.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) {
        self.rules.extend(rules);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, text: &str) -> (String, usize) {
        fold_rules(&self.rules, text)
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Serializable rule description used by config-defined profiles.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleSpec {
    Literal {
        from: String,
        to: String,
    },
    Pattern {
        pattern: String,
        template: String,
        #[serde(default)]
        unless_followed_by: Option<String>,
    },
}

impl RuleSpec {
    pub fn compile(&self) -> Result<Rule> {
        match self {
            Self::Literal { from, to } => Rule::literal(from.as_str(), to.as_str()),
            Self::Pattern {
                pattern,
                template,
                unless_followed_by: None,
            } => Rule::pattern(pattern, template),
            Self::Pattern {
                pattern,
                template,
                unless_followed_by: Some(guard),
            } => Rule::guarded_pattern(pattern, template, guard),
        }
    }
}

fn compile_pattern(pattern: &str, template: &str, guard: Option<&str>) -> Result<Rule> {
    let regex =
        Regex::new(pattern).with_context(|| format!("invalid rule pattern `{pattern}`"))?;
    let unless_followed_by = match guard {
        Some(guard) => Some(
            Regex::new(&format!(r"\A(?:{guard})"))
                .with_context(|| format!("invalid rule guard `{guard}`"))?,
        ),
        None => None,
    };
    Ok(Rule::Pattern {
        regex,
        template: translate_template(template),
        unless_followed_by,
    })
}

fn fold_rules(rules: &[Rule], text: &str) -> (String, usize) {
    rules
        .iter()
        .fold((text.to_string(), 0usize), |(current, total), rule| {
            let (next, count) = rule.apply(&current);
            (next, total + count)
        })
}

fn apply_pattern(
    regex: &Regex,
    template: &str,
    guard: Option<&Regex>,
    text: &str,
) -> (String, usize) {
    let mut count = 0usize;
    let rewritten = regex.replace_all(text, |caps: &Captures<'_>| {
        let end = caps.get(0).map_or(0, |whole| whole.end());
        if let Some(guard) = guard
            && guard.is_match(&text[end..])
        {
            return caps[0].to_string();
        }
        count += 1;
        let mut expanded = String::new();
        caps.expand(template, &mut expanded);
        expanded
    });
    (rewritten.into_owned(), count)
}

/// Convert a backslash-style replacement template into the `regex` crate's
/// `$`-style syntax. `\1` and `\g<name>` become `${1}` / `${name}`, `\n` and
/// `\t` become control characters.
///
/// A template that uses backslash references treats every `$` as literal
/// text. Otherwise `$1` / `${name}` stay group references and any other `$`
/// is literal, so a literal `$5` must be written `$$5` there.
fn translate_template(template: &str) -> String {
    let literal_dollars = uses_backslash_refs(template);
    let mut out = String::with_capacity(template.len() + 8);
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '$' if literal_dollars => out.push_str("$$"),
            '$' => {
                match chars.peek() {
                    Some(next) if next.is_ascii_alphanumeric() || *next == '{' || *next == '_' => {
                        out.push('$');
                    }
                    Some('$') => {
                        chars.next();
                        out.push_str("$$");
                    }
                    _ => out.push_str("$$"),
                }
            }
            '\\' => match chars.peek().copied() {
                Some(digit) if digit.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(next) = chars.peek().copied() {
                        if !next.is_ascii_digit() {
                            break;
                        }
                        group.push(next);
                        chars.next();
                    }
                    out.push_str("${");
                    out.push_str(&group);
                    out.push('}');
                }
                Some('g') => {
                    chars.next();
                    if chars.peek() == Some(&'<') {
                        chars.next();
                        let mut name = String::new();
                        for next in chars.by_ref() {
                            if next == '>' {
                                break;
                            }
                            name.push(next);
                        }
                        out.push_str("${");
                        out.push_str(&name);
                        out.push('}');
                    } else {
                        out.push_str("\\g");
                    }
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

fn uses_backslash_refs(template: &str) -> bool {
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            continue;
        }
        match chars.next() {
            Some(next) if next.is_ascii_digit() => return true,
            Some('g') if chars.peek() == Some(&'<') => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rule_replaces_every_occurrence_and_counts() {
        let rule = Rule::literal("Supabase", "Firebase").expect("rule");
        let (out, count) = rule.apply("Supabase client");
        assert_eq!(out, "Firebase client");
        assert_eq!(count, 1);

        let (out, count) = rule.apply("Supabase, Supabase, Supabase");
        assert_eq!(out, "Firebase, Firebase, Firebase");
        assert_eq!(count, 3);
    }

    #[test]
    fn literal_rule_rejects_empty_match() {
        assert!(Rule::literal("", "x").is_err());
    }

    #[test]
    fn pattern_rule_expands_backslash_references() {
        let rule = Rule::pattern(r#"supabase\.from\(['"](\w+)['"]\)"#, r"db.collection('\1')")
            .expect("rule");
        let (out, count) = rule.apply("supabase.from('videos')");
        assert_eq!(out, "db.collection('videos')");
        assert_eq!(count, 1);
    }

    #[test]
    fn pattern_rule_accepts_dollar_references() {
        let rule = Rule::pattern(r"(\w+)@(\w+)", "${2}:$1").expect("rule");
        let (out, _) = rule.apply("user@host");
        assert_eq!(out, "host:user");
    }

    #[test]
    fn pattern_rule_escapes_literal_dollar() {
        let rule = Rule::pattern("price", "$ 5").expect("rule");
        let (out, count) = rule.apply("price");
        assert_eq!(out, "$ 5");
        assert_eq!(count, 1);
    }

    #[test]
    fn pattern_rule_reports_invalid_regex() {
        let error = Rule::pattern("(unclosed", "x").expect_err("must fail");
        assert!(error.to_string().contains("invalid rule pattern"));
    }

    #[test]
    fn guarded_pattern_leaves_guarded_matches_alone() {
        let rule = Rule::guarded_pattern(r"\bSupabase\b", "Firebase", r"\s+to\s+Firebase")
            .expect("rule");
        let (out, count) = rule.apply("Supabase to Firebase notes. Supabase auth.");
        assert_eq!(out, "Supabase to Firebase notes. Firebase auth.");
        assert_eq!(count, 1);
    }

    #[test]
    fn unless_rule_skips_when_word_present() {
        let rule = Rule::unless_present(
            &["migration"],
            vec![Rule::literal("supabase", "firebase").expect("rule")],
        );
        let (out, count) = rule.apply("supabase Migration guide");
        assert_eq!(out, "supabase Migration guide");
        assert_eq!(count, 0);

        let (out, count) = rule.apply("supabase guide");
        assert_eq!(out, "firebase guide");
        assert_eq!(count, 1);
    }

    #[test]
    fn rule_set_feeds_each_rule_the_previous_output() {
        let rules = RuleSet::new(vec![
            Rule::literal("supabase", "firebase").expect("rule"),
            // Never fires: the first rule already rewrote the prefix.
            Rule::literal("supabase.auth", "auth").expect("rule"),
            Rule::literal("firebase.auth", "auth").expect("rule"),
        ]);
        let (out, count) = rules.apply("supabase.auth.signOut()");
        assert_eq!(out, "auth.signOut()");
        assert_eq!(count, 2);
    }

    #[test]
    fn translate_template_handles_escapes() {
        assert_eq!(translate_template(r"a\1b"), "a${1}b");
        assert_eq!(translate_template(r"\g<name>"), "${name}");
        assert_eq!(translate_template(r"x\ny"), "x\ny");
        assert_eq!(translate_template("cost $"), "cost $$");
        assert_eq!(translate_template("$$"), "$$");
        assert_eq!(translate_template(r"\\1"), r"\1");
    }

    #[test]
    fn dollars_are_literal_next_to_backslash_refs() {
        let rule = Rule::pattern(r"price (\d+)", r"cost $\1 ($5 off)").expect("rule");
        let (out, count) = rule.apply("price 20");
        assert_eq!(out, "cost $20 ($5 off)");
        assert_eq!(count, 1);

        let rule = Rule::pattern(r"price (\d+)", "cost $$5 then $1").expect("rule");
        assert_eq!(rule.apply("price 20").0, "cost $5 then 20");
    }

    #[test]
    fn rule_spec_compiles_from_toml() {
        #[derive(Deserialize)]
        struct Table {
            rules: Vec<RuleSpec>,
        }

        let specs = toml::from_str::<Table>(
            r#"
rules = [
  { kind = "literal", from = "Postgres", to = "Firestore" },
  { kind = "pattern", pattern = "rpc\\('(\\w+)'\\)", template = "call('\\1')" },
]
"#,
        )
        .expect("toml")
        .rules;
        assert_eq!(specs.len(), 2);
        let rules = RuleSet::new(
            specs
                .iter()
                .map(RuleSpec::compile)
                .collect::<Result<Vec<_>>>()
                .expect("compile"),
        );
        let (out, count) = rules.apply("Postgres rpc('sync')");
        assert_eq!(out, "Firestore call('sync')");
        assert_eq!(count, 2);
    }

    #[test]
    fn display_lists_rule_shape() {
        let rule = Rule::literal("a", "b").expect("rule");
        assert_eq!(rule.to_string(), r#"literal "a" -> "b""#);
    }
}
