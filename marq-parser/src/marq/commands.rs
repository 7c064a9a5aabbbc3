//! The closed set of markup commands and the name table that resolves them.
//!
//! Every built-in command is a `Cmd` variant. The variants double as indices
//! into the static name table, so the table is verified to be in declaration
//! order when it is built; a gap or transposition there is a programming
//! error that would silently corrupt end-command lookups, and building the
//! table fails fast instead.
//!
//! Configuration may rename commands ("aliases"). The lookup map is keyed by
//! the renamed spellings; the original spelling of a renamed command becomes
//! unknown, and the parser uses [`CommandTable::renamed_to`] to explain that
//! in its unknown-command diagnostic.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One opcode per markup command. Declaration order matches `BUILTIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmd {
    A,
    Abstract,
    AnnotatedList,
    B,
    BadCode,
    Bold,
    Br,
    Brief,
    C,
    Caption,
    Chapter,
    Code,
    CodeLine,
    Div,
    Dots,
    E,
    Else,
    EndAbstract,
    EndChapter,
    EndCode,
    EndDiv,
    EndFootnote,
    EndIf,
    EndLegalese,
    EndLink,
    EndList,
    EndOmit,
    EndPart,
    EndQuotation,
    EndRaw,
    EndSection1,
    EndSection2,
    EndSection3,
    EndSection4,
    EndSidebar,
    EndTable,
    Footnote,
    GenerateList,
    Header,
    Hr,
    I,
    If,
    Image,
    Important,
    Include,
    Index,
    InlineImage,
    Input,
    Keyword,
    L,
    Legalese,
    Li,
    Link,
    List,
    Meta,
    NewCode,
    Note,
    O,
    OldCode,
    Omit,
    OmitValue,
    Overload,
    Part,
    Quotation,
    Raw,
    Row,
    Sa,
    Section1,
    Section2,
    Section3,
    Section4,
    Sidebar,
    SinceList,
    Span,
    Sub,
    Sup,
    Table,
    TableOfContents,
    Target,
    Tt,
    UiControl,
    Underline,
    Unicode,
    Value,
    Warning,
}

/// English command spellings, in `Cmd` declaration order.
static BUILTIN: &[(&str, Cmd)] = &[
    ("a", Cmd::A),
    ("abstract", Cmd::Abstract),
    ("annotatedlist", Cmd::AnnotatedList),
    ("b", Cmd::B),
    ("badcode", Cmd::BadCode),
    ("bold", Cmd::Bold),
    ("br", Cmd::Br),
    ("brief", Cmd::Brief),
    ("c", Cmd::C),
    ("caption", Cmd::Caption),
    ("chapter", Cmd::Chapter),
    ("code", Cmd::Code),
    ("codeline", Cmd::CodeLine),
    ("div", Cmd::Div),
    ("dots", Cmd::Dots),
    ("e", Cmd::E),
    ("else", Cmd::Else),
    ("endabstract", Cmd::EndAbstract),
    ("endchapter", Cmd::EndChapter),
    ("endcode", Cmd::EndCode),
    ("enddiv", Cmd::EndDiv),
    ("endfootnote", Cmd::EndFootnote),
    ("endif", Cmd::EndIf),
    ("endlegalese", Cmd::EndLegalese),
    ("endlink", Cmd::EndLink),
    ("endlist", Cmd::EndList),
    ("endomit", Cmd::EndOmit),
    ("endpart", Cmd::EndPart),
    ("endquotation", Cmd::EndQuotation),
    ("endraw", Cmd::EndRaw),
    ("endsection1", Cmd::EndSection1),
    ("endsection2", Cmd::EndSection2),
    ("endsection3", Cmd::EndSection3),
    ("endsection4", Cmd::EndSection4),
    ("endsidebar", Cmd::EndSidebar),
    ("endtable", Cmd::EndTable),
    ("footnote", Cmd::Footnote),
    ("generatelist", Cmd::GenerateList),
    ("header", Cmd::Header),
    ("hr", Cmd::Hr),
    ("i", Cmd::I),
    ("if", Cmd::If),
    ("image", Cmd::Image),
    ("important", Cmd::Important),
    ("include", Cmd::Include),
    ("index", Cmd::Index),
    ("inlineimage", Cmd::InlineImage),
    ("input", Cmd::Input),
    ("keyword", Cmd::Keyword),
    ("l", Cmd::L),
    ("legalese", Cmd::Legalese),
    ("li", Cmd::Li),
    ("link", Cmd::Link),
    ("list", Cmd::List),
    ("meta", Cmd::Meta),
    ("newcode", Cmd::NewCode),
    ("note", Cmd::Note),
    ("o", Cmd::O),
    ("oldcode", Cmd::OldCode),
    ("omit", Cmd::Omit),
    ("omitvalue", Cmd::OmitValue),
    ("overload", Cmd::Overload),
    ("part", Cmd::Part),
    ("quotation", Cmd::Quotation),
    ("raw", Cmd::Raw),
    ("row", Cmd::Row),
    ("sa", Cmd::Sa),
    ("section1", Cmd::Section1),
    ("section2", Cmd::Section2),
    ("section3", Cmd::Section3),
    ("section4", Cmd::Section4),
    ("sidebar", Cmd::Sidebar),
    ("sincelist", Cmd::SinceList),
    ("span", Cmd::Span),
    ("sub", Cmd::Sub),
    ("sup", Cmd::Sup),
    ("table", Cmd::Table),
    ("tableofcontents", Cmd::TableOfContents),
    ("target", Cmd::Target),
    ("tt", Cmd::Tt),
    ("uicontrol", Cmd::UiControl),
    ("underline", Cmd::Underline),
    ("unicode", Cmd::Unicode),
    ("value", Cmd::Value),
    ("warning", Cmd::Warning),
];

/// The unaliased table, shared by every `CommandTable` built without renames.
static BUILTIN_INDEX: Lazy<HashMap<&'static str, Cmd>> =
    Lazy::new(|| BUILTIN.iter().copied().collect());

impl Cmd {
    /// The closing command for an open command, or the command itself when
    /// it does not open a span.
    pub fn end_cmd(self) -> Cmd {
        match self {
            Cmd::Abstract => Cmd::EndAbstract,
            Cmd::BadCode => Cmd::EndCode,
            Cmd::Chapter => Cmd::EndChapter,
            Cmd::Code => Cmd::EndCode,
            Cmd::Div => Cmd::EndDiv,
            Cmd::Footnote => Cmd::EndFootnote,
            Cmd::Legalese => Cmd::EndLegalese,
            Cmd::Link => Cmd::EndLink,
            Cmd::List => Cmd::EndList,
            Cmd::NewCode => Cmd::EndCode,
            Cmd::OldCode => Cmd::NewCode,
            Cmd::Omit => Cmd::EndOmit,
            Cmd::Part => Cmd::EndPart,
            Cmd::Quotation => Cmd::EndQuotation,
            Cmd::Raw => Cmd::EndRaw,
            Cmd::Section1 => Cmd::EndSection1,
            Cmd::Section2 => Cmd::EndSection2,
            Cmd::Section3 => Cmd::EndSection3,
            Cmd::Section4 => Cmd::EndSection4,
            Cmd::Sidebar => Cmd::EndSidebar,
            Cmd::Table => Cmd::EndTable,
            other => other,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Errors detected while building the command table. All of them are fatal
/// for the run: a broken table would misresolve every later lookup.
#[derive(Debug, Clone)]
pub enum TableError {
    /// The static name table disagrees with `Cmd` declaration order.
    OutOfOrder { index: usize, name: String },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::OutOfOrder { index, name } => {
                write!(f, "command '{}' out of order at table index {}", name, index)
            }
        }
    }
}

impl std::error::Error for TableError {}

/// The name-to-opcode map the parser dispatches through.
pub struct CommandTable {
    by_name: HashMap<String, Cmd>,
    // canonical (possibly renamed) spelling per command, indexed by opcode
    names: Vec<String>,
    // original spelling -> configured rename, for diagnostics
    renames: HashMap<String, String>,
    warnings: Vec<String>,
}

impl CommandTable {
    /// Builds the table, applying configured renames. `aliases` maps the
    /// English spelling to the spelling the user wants to write instead.
    pub fn build(aliases: &BTreeMap<String, String>) -> Result<CommandTable, TableError> {
        let mut by_name = HashMap::with_capacity(BUILTIN.len());
        let mut names = Vec::with_capacity(BUILTIN.len());
        let mut renames = HashMap::new();
        let mut warnings = Vec::new();

        let mut reverse: HashMap<&str, &str> = HashMap::new();
        for (english, alias) in aliases {
            if let Some(prev) = reverse.get(alias.as_str()) {
                warnings.push(format!(
                    "command name '\\{}' cannot stand for both '\\{}' and '\\{}'",
                    alias, prev, english
                ));
            } else {
                reverse.insert(alias, english);
            }
        }

        for (i, (english, cmd)) in BUILTIN.iter().enumerate() {
            if cmd.index() != i {
                return Err(TableError::OutOfOrder {
                    index: i,
                    name: (*english).to_string(),
                });
            }
            let canonical = aliases
                .get(*english)
                .cloned()
                .unwrap_or_else(|| (*english).to_string());
            if canonical != *english {
                renames.insert((*english).to_string(), canonical.clone());
            }
            by_name.insert(canonical.clone(), *cmd);
            names.push(canonical);
        }

        Ok(CommandTable {
            by_name,
            names,
            renames,
            warnings,
        })
    }

    /// The table with no renames applied.
    pub fn builtin() -> CommandTable {
        // The unaliased build can only fail if BUILTIN itself is broken,
        // which the unit tests pin down.
        CommandTable::build(&BTreeMap::new()).unwrap_or_else(|e| {
            unreachable!("builtin command table failed to verify: {}", e)
        })
    }

    pub fn lookup(&self, name: &str) -> Option<Cmd> {
        self.by_name.get(name).copied()
    }

    /// The (possibly renamed) spelling of a command.
    pub fn name_of(&self, cmd: Cmd) -> &str {
        &self.names[cmd.index()]
    }

    pub fn end_name_of(&self, cmd: Cmd) -> &str {
        self.name_of(cmd.end_cmd())
    }

    /// When the user writes the original spelling of a renamed command,
    /// returns the spelling the configuration renamed it to.
    pub fn renamed_to(&self, original: &str) -> Option<&str> {
        self.renames.get(original).map(String::as_str)
    }

    /// Every spelling the table currently answers to.
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Warnings produced while applying renames (duplicate alias targets).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        CommandTable::builtin()
    }
}

/// Whether `name` is one of the built-in English spellings. Built-ins are
/// dispatched before user macros are consulted, so a macro with this name
/// would never be reachable.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_INDEX.contains_key(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_in_declaration_order() {
        // CommandTable::build re-verifies this; here we make the invariant a
        // red test instead of a runtime failure.
        for (i, (name, cmd)) in BUILTIN.iter().enumerate() {
            assert_eq!(*cmd as usize, i, "'{}' is out of order", name);
        }
    }

    #[test]
    fn lookup_resolves_builtin_names() {
        let table = CommandTable::builtin();
        assert_eq!(table.lookup("list"), Some(Cmd::List));
        assert_eq!(table.lookup("endlist"), Some(Cmd::EndList));
        assert_eq!(table.lookup("nosuchcommand"), None);
    }

    #[test]
    fn end_cmd_pairs_open_and_close() {
        assert_eq!(Cmd::Table.end_cmd(), Cmd::EndTable);
        assert_eq!(Cmd::OldCode.end_cmd(), Cmd::NewCode);
        assert_eq!(Cmd::NewCode.end_cmd(), Cmd::EndCode);
        // non-span commands close themselves
        assert_eq!(Cmd::Br.end_cmd(), Cmd::Br);
    }

    #[test]
    fn rename_moves_the_spelling() {
        let mut aliases = BTreeMap::new();
        aliases.insert("underline".to_string(), "u".to_string());
        let table = CommandTable::build(&aliases).unwrap();
        assert_eq!(table.lookup("u"), Some(Cmd::Underline));
        assert_eq!(table.lookup("underline"), None);
        assert_eq!(table.renamed_to("underline"), Some("u"));
        assert_eq!(table.name_of(Cmd::Underline), "u");
    }

    #[test]
    fn duplicate_alias_target_warns() {
        let mut aliases = BTreeMap::new();
        aliases.insert("b".to_string(), "strong".to_string());
        aliases.insert("e".to_string(), "strong".to_string());
        let table = CommandTable::build(&aliases).unwrap();
        assert_eq!(table.warnings().len(), 1);
    }
}
