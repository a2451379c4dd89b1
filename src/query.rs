//! Set-algebra query AST over named genomes (samples).
//!
//! A query combines genome leaves with four binary set operations.
//! Evaluating a leaf produces a *borrowed* view into a bitmap that some
//! other part of the call already keeps alive; evaluating an operator
//! node produces a freshly computed, *owned* bitmap. Rust's ownership
//! rules make this asymmetry automatic: an owned [`Bitmap`] and a
//! [`BitmapView`] both implement [`BitmapLike`], and whichever one a
//! subtree returns is simply dropped when it goes out of scope — there is
//! no separate "free the wrapper but not its array" bookkeeping to get
//! wrong.

use rustc_hash::FxHashMap;

use crate::bitmap::{self, Bitmap, BitmapLike, BitmapView, RunCursor};
use crate::catalog::{Catalog, ChromRecord};
use crate::error::{Result, TdbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}

/// A set-algebra expression over genome names.
#[derive(Debug, Clone)]
pub enum Ast {
    Leaf(String),
    Node {
        op: Op,
        left: Box<Ast>,
        right: Box<Ast>,
    },
}

impl Ast {
    pub fn leaf(name: impl Into<String>) -> Self {
        Ast::Leaf(name.into())
    }

    pub fn node(op: Op, left: Ast, right: Ast) -> Self {
        Ast::Node {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Fold `genomes` left-to-right under `op`, e.g. `[a, b, c]` with
    /// `Union` becomes `(a ∪ b) ∪ c`.
    pub fn list_subtree(op: Op, genomes: &[String]) -> Result<Self> {
        let mut iter = genomes.iter();
        let first = iter
            .next()
            .ok_or(TdbError::NoQuery)?
            .clone();
        let mut tree = Ast::leaf(first);
        for name in iter {
            tree = Ast::node(op, tree, Ast::leaf(name.clone()));
        }
        Ok(tree)
    }

    /// Every genome name referenced by this query, in first-use order
    /// with duplicates removed (used to decide what to load up front).
    pub fn genome_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Ast::Leaf(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Ast::Node { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
        }
    }

    /// Evaluate the query over `[start, end)`, returning an owned result
    /// bitmap regardless of whether the root happens to be a bare leaf
    /// (which would otherwise hand back a borrow into `loaded`).
    pub fn eval(&self, loaded: &LoadedGenomes, start: u64, end: u64) -> Result<Bitmap> {
        Ok(match self.eval_handle(loaded, start, end)? {
            BitmapHandle::Owned(b) => b,
            BitmapHandle::Borrowed(v) => bitmap::to_owned(&v),
        })
    }

    fn eval_handle<'a>(&self, loaded: &'a LoadedGenomes, start: u64, end: u64) -> Result<BitmapHandle<'a>> {
        match self {
            Ast::Leaf(name) => {
                let bm = loaded
                    .get(name)
                    .ok_or_else(|| TdbError::NoSuchSample(name.clone()))?;
                Ok(BitmapHandle::Borrowed(bm.view(start, end)))
            }
            Ast::Node { op, left, right } => {
                let l = left.eval_handle(loaded, start, end)?;
                let r = right.eval_handle(loaded, start, end)?;
                let combined = match op {
                    Op::Union => bitmap::union(&l, &r),
                    Op::Intersection => bitmap::intersect(&l, &r),
                    Op::Difference => bitmap::difference(&l, &r),
                    Op::SymmetricDifference => bitmap::symmetric_difference(&l, &r),
                };
                Ok(BitmapHandle::Owned(combined))
            }
        }
    }
}

/// A computed subtree result (owned) or a region view into a
/// pre-loaded genome bitmap (borrowed) — unified only for the purpose of
/// reading bit patterns; see [`BitmapLike`].
enum BitmapHandle<'a> {
    Owned(Bitmap),
    Borrowed(BitmapView<'a>),
}

impl BitmapLike for BitmapHandle<'_> {
    fn bit_len(&self) -> u64 {
        match self {
            BitmapHandle::Owned(b) => b.bit_len(),
            BitmapHandle::Borrowed(v) => v.bit_len(),
        }
    }
    fn run_cursor(&self) -> RunCursor {
        match self {
            BitmapHandle::Owned(b) => b.run_cursor(),
            BitmapHandle::Borrowed(v) => v.run_cursor(),
        }
    }
}

/// Every genome bitmap a query needs, loaded once up front so leaf
/// evaluation can hand out zero-copy views rather than reloading from
/// the catalog at every reference to the same name.
pub struct LoadedGenomes {
    bitmaps: FxHashMap<String, Bitmap>,
}

impl LoadedGenomes {
    pub fn load(catalog: &Catalog, chrom: &ChromRecord, names: &[String]) -> Result<Self> {
        let mut bitmaps = FxHashMap::default();
        for name in names {
            let genome = catalog
                .find_genome(name)
                .ok_or_else(|| TdbError::NoSuchSample(name.clone()))?;
            let bm = catalog.get_bitmap(chrom, &genome).unwrap_or_default();
            bitmaps.insert(name.clone(), bm);
        }
        Ok(Self { bitmaps })
    }

    fn get(&self, name: &str) -> Option<&Bitmap> {
        self.bitmaps.get(name)
    }
}

/// Parse a query string using `|` (union), `&` (intersection), `-`
/// (difference), `^` (symmetric difference), parentheses for grouping,
/// and bare identifiers for genome names. All four operators share one
/// precedence tier and associate left-to-right; parentheses are the only
/// way to override evaluation order.
pub fn parse(input: &str) -> Result<Ast> {
    let tokens = tokenize(input)?;
    let mut pos = 0;
    let ast = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(TdbError::NoQuery);
    }
    Ok(ast)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '|' | '&' | '-' | '^' => {
                chars.next();
                tokens.push(Token::Op(c));
            }
            _ if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            _ => return Err(TdbError::NoQuery),
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<Ast> {
    let mut left = parse_primary(tokens, pos)?;
    while let Some(Token::Op(c)) = tokens.get(*pos) {
        let op = match c {
            '|' => Op::Union,
            '&' => Op::Intersection,
            '-' => Op::Difference,
            '^' => Op::SymmetricDifference,
            _ => unreachable!(),
        };
        *pos += 1;
        let right = parse_primary(tokens, pos)?;
        left = Ast::node(op, left, right);
    }
    Ok(left)
}

fn parse_primary(tokens: &[Token], pos: &mut usize) -> Result<Ast> {
    match tokens.get(*pos) {
        Some(Token::Ident(name)) => {
            *pos += 1;
            Ok(Ast::leaf(name.clone()))
        }
        Some(Token::LParen) => {
            *pos += 1;
            let inner = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => {
                    *pos += 1;
                    Ok(inner)
                }
                _ => Err(TdbError::NoQuery),
            }
        }
        _ => Err(TdbError::NoQuery),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_subtree_is_left_leaning() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ast = Ast::list_subtree(Op::Union, &names).unwrap();
        assert_eq!(ast.genome_names(), names);
    }

    #[test]
    fn parses_flat_and_parenthesized_expressions() {
        let ast = parse("a & b | c").unwrap();
        assert_eq!(ast.genome_names(), vec!["a", "b", "c"]);
        let ast2 = parse("a & (b | c)").unwrap();
        assert_eq!(ast2.genome_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(parse("(a & b").is_err());
        assert!(parse("a & b)").is_err());
    }
}
