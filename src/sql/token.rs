/// Token kinds and keyword table for the SQL lexer
use phf::phf_map;

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "create" => TokenKind::Create,
    "select" => TokenKind::Select,
    "insert" => TokenKind::Insert,
    "update" => TokenKind::Update,
    "delete" => TokenKind::Delete,
    "truncate" => TokenKind::Truncate,
    "drop" => TokenKind::Drop,
    "grant" => TokenKind::Grant,
    "distinct" => TokenKind::Distinct,
    "from" => TokenKind::From,
    "where" => TokenKind::Where,
    "table" => TokenKind::Table,
    "into" => TokenKind::Into,
    "values" => TokenKind::Values,
    "join" => TokenKind::Join,
    "on" => TokenKind::On,
    "if" => TokenKind::If,
    "not" => TokenKind::Not,
    "exists" => TokenKind::Exists,
    "null" => TokenKind::Null,
    "autoincrement" => TokenKind::AutoIncrement,
    "auto_increment" => TokenKind::AutoIncrement,
    "count" => TokenKind::Count,
    "set" => TokenKind::Set,
    "order" => TokenKind::Order,
    "by" => TokenKind::By,
    "with" => TokenKind::With,
    "time" => TokenKind::Time,
    "zone" => TokenKind::Zone,
    "returning" => TokenKind::Returning,
    "in" => TokenKind::In,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "asc" => TokenKind::Asc,
    "desc" => TokenKind::Desc,
    "limit" => TokenKind::Limit,
    "offset" => TokenKind::Offset,
    "is" => TokenKind::Is,
    "for" => TokenKind::For,
    "default" => TokenKind::Default,
    "localtimestamp" => TokenKind::LocalTimestamp,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "unique" => TokenKind::Unique,
    "index" => TokenKind::Index,
    "collate" => TokenKind::Collate,
    "nocase" => TokenKind::Nocase,
    "primary" => TokenKind::Primary,
    "key" => TokenKind::Key,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Punctuation
    Space,
    Semicolon,
    Comma,
    LParen,
    RParen,
    Lt,        // <
    Gt,        // >
    Le,        // <=
    Ge,        // >=
    Eq,        // =
    Ne,        // != or <>
    Star,
    Period,

    // Literals
    String,      // '...'
    QuotedIdent, // "..." or `...`
    Number,
    Date,
    Identifier,

    // First order keywords
    Create,
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    Drop,
    Grant,
    Distinct,

    // Second order keywords
    From,
    Where,
    Table,
    Into,
    Values,
    Join,
    On,
    If,
    Not,
    Exists,
    Null,
    AutoIncrement,
    Count,
    Set,
    Order,
    By,
    With,
    Time,
    Zone,
    Returning,
    In,
    And,
    Or,
    Asc,
    Desc,
    Limit,
    Offset,
    Is,
    For,
    Default,
    LocalTimestamp,
    Now, // NOW()
    True,
    False,
    Unique,
    Index,
    Collate,
    Nocase,
    Primary,
    Key,
}

impl TokenKind {
    /// Look up a keyword, case-insensitively.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let lowercase = word.to_lowercase();
        KEYWORDS.get(lowercase.as_str()).copied()
    }

    /// Keywords that may also name a table or a column.
    pub fn is_soft_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Time | TokenKind::Zone | TokenKind::Key | TokenKind::Nocase | TokenKind::Index
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    /// Character offset of the token in the source text
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Drop whitespace tokens, keeping everything else in order.
pub fn strip_spaces(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|t| t.kind != TokenKind::Space)
        .collect()
}
