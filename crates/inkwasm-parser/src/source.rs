//! Per-file discovery.
//!
//! Works in two phases. First every marker comment and every leaf
//! declaration site (with its attribute, keyword, and end lines) is
//! collected, and each marker is paired with the site that follows it.
//! Then each pair is resolved on its own into a [`Function`].

use std::path::Path;

use inkwasm_bind::{Argument, Function, Hint, HostSignature, ScriptTarget, DISCARD_NAME};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, ExprLit, FnArg, Lit, Meta, Pat, Token, Type};

use crate::error::{ParseError, Result};
use crate::marker::{self, Marker};
use crate::shape::{Imports, Resolver};

/// Settings shared by every file of one package.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileContext<'a> {
    pub prefix: &'a str,
    pub in_runtime: bool,
    pub include_tests: bool,
    pub file_is_test: bool,
}

/// An out-of-line `mod name;` declaration found while walking a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleDecl {
    pub name: String,
    /// Value of a `#[path = "..."]` attribute.
    pub path_attr: Option<String>,
    /// Names of the inline modules enclosing the declaration.
    pub nesting: Vec<String>,
    pub is_test: bool,
    pub line: usize,
}

/// Discovery result for one file.
#[derive(Debug, Default)]
pub(crate) struct ParsedFile {
    pub functions: Vec<Function>,
    pub modules: Vec<ModuleDecl>,
}

enum Decl<'a> {
    Function(&'a syn::Signature),
    Struct(&'a syn::ItemStruct),
    Other(&'static str),
}

impl Decl<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Decl::Function(_) => "function",
            Decl::Struct(_) => "struct",
            Decl::Other(what) => what,
        }
    }
}

struct Site<'a> {
    keyword: usize,
    end: usize,
    is_test: bool,
    scope: usize,
    decl: Decl<'a>,
}

impl Site<'_> {
    /// Whether `line` falls after the declaration keyword, inside the item.
    fn encloses(&self, line: usize) -> bool {
        self.keyword < line && line <= self.end
    }
}

#[derive(Default)]
struct Collector<'a> {
    sites: Vec<Site<'a>>,
    scopes: Vec<Imports>,
    modules: Vec<ModuleDecl>,
}

impl<'a> Collector<'a> {
    fn walk(&mut self, items: &'a [syn::Item], is_test: bool, nesting: &mut Vec<String>) {
        let scope = self.scopes.len();
        self.scopes.push(Imports::collect(items));

        for item in items {
            let span = item.span();
            let (start, end) = (span.start().line, span.end().line);
            let item_test = is_test || has_cfg_test(item_attrs(item));
            let leaf = |keyword: usize, decl: Decl<'a>| Site {
                keyword,
                end,
                is_test: item_test,
                scope,
                decl,
            };

            match item {
                syn::Item::Fn(func) => {
                    let site = leaf(func.sig.fn_token.span.start().line, Decl::Function(&func.sig));
                    self.sites.push(site);
                }
                syn::Item::Struct(item_struct) => {
                    let site = leaf(item_struct.struct_token.span.start().line, Decl::Struct(item_struct));
                    self.sites.push(site);
                }
                syn::Item::ForeignMod(block) => {
                    for foreign in &block.items {
                        let span = foreign.span();
                        let (keyword, decl) = match foreign {
                            syn::ForeignItem::Fn(func) => {
                                (func.sig.fn_token.span.start().line, Decl::Function(&func.sig))
                            }
                            _ => (span.start().line, Decl::Other("foreign item")),
                        };
                        let foreign_test = item_test || has_cfg_test(foreign_attrs(foreign));
                        self.sites.push(Site {
                            keyword,
                            end: span.end().line,
                            is_test: foreign_test,
                            scope,
                            decl,
                        });
                    }
                }
                syn::Item::Mod(module) => match &module.content {
                    Some((_, inner)) => {
                        nesting.push(module.ident.to_string());
                        self.walk(inner, item_test, nesting);
                        nesting.pop();
                    }
                    None => {
                        let keyword = module.mod_token.span.start().line;
                        self.modules.push(ModuleDecl {
                            name: module.ident.to_string(),
                            path_attr: path_attr(&module.attrs),
                            nesting: nesting.clone(),
                            is_test: item_test,
                            line: keyword,
                        });
                        let site = leaf(keyword, Decl::Other("module declaration"));
                        self.sites.push(site);
                    }
                },
                other => {
                    let site = leaf(start, Decl::Other(item_kind(other)));
                    self.sites.push(site);
                }
            }
        }
    }
}

struct Pairing {
    line: usize,
    hint: Hint,
    path: String,
    site: usize,
}

/// Discover annotated declarations and module declarations in one file.
pub(crate) fn parse_source(ctx: &FileContext<'_>, file: &Path, source: &str) -> Result<ParsedFile> {
    let markers = marker::scan(ctx.prefix, source);

    let syntax = syn::parse_file(source).map_err(|err| ParseError::Syntax {
        file: file.to_path_buf(),
        line: err.span().start().line,
        message: err.to_string(),
    })?;
    let file_is_test = ctx.file_is_test || has_cfg_test(&syntax.attrs);

    let mut collector = Collector::default();
    collector.walk(&syntax.items, file_is_test, &mut Vec::new());

    let pairs = pair(ctx, file, markers, &collector.sites)?;
    let mut functions = Vec::with_capacity(pairs.len());
    for pairing in pairs {
        let site = &collector.sites[pairing.site];
        let resolver = Resolver::new(&collector.scopes[site.scope], ctx.in_runtime);
        let host = resolve_host(ctx.prefix, &resolver, &site.decl)
            .map_err(|message| ParseError::located(file, site.keyword, message))?;
        tracing::debug!(
            file = %file.display(),
            line = site.keyword,
            marker = pairing.line,
            hint = %pairing.hint,
            name = %host.name,
            "discovered annotated declaration"
        );
        functions.push(Function {
            file: file.to_path_buf(),
            line: site.keyword,
            is_test: site.is_test,
            host,
            script: ScriptTarget {
                path: pairing.path,
                hint: pairing.hint,
            },
        });
    }

    let modules = collector
        .modules
        .into_iter()
        .filter(|module| ctx.include_tests || !module.is_test)
        .collect();
    Ok(ParsedFile { functions, modules })
}

/// Phase one: match every marker with the declaration site that follows it.
fn pair(ctx: &FileContext<'_>, file: &Path, markers: Vec<Marker>, sites: &[Site<'_>]) -> Result<Vec<Pairing>> {
    let mut pairs: Vec<Pairing> = Vec::new();
    let mut open: Option<(usize, usize)> = None;

    for marker in markers {
        if sites.iter().any(|site| site.encloses(marker.line)) {
            continue;
        }
        let (hint, path) = marker
            .body
            .map_err(|message| ParseError::located(file, marker.line, message))?;

        let Some(index) = sites.iter().position(|site| site.keyword > marker.line) else {
            return Err(ParseError::located(
                file,
                marker.line,
                format!("//{}:{hint} is not followed by a declaration", ctx.prefix),
            ));
        };
        if let Some((open_line, open_site)) = open {
            if open_site == index {
                return Err(ParseError::located(
                    file,
                    open_line,
                    format!("marker is followed by another marker at line {}", marker.line),
                ));
            }
        }
        open = Some((marker.line, index));

        let site = &sites[index];
        let compatible = match (&site.decl, hint.is_export()) {
            (Decl::Struct(_), true) | (Decl::Function(_), false) => true,
            _ => false,
        };
        if !compatible {
            let expected = if hint.is_export() { "struct" } else { "function" };
            return Err(ParseError::located(
                file,
                marker.line,
                format!(
                    "//{}:{hint} must precede a {expected} declaration, found {}",
                    ctx.prefix,
                    site.decl.describe()
                ),
            ));
        }
        if site.is_test && !ctx.include_tests {
            continue;
        }
        pairs.push(Pairing {
            line: marker.line,
            hint,
            path,
            site: index,
        });
    }

    tracing::trace!(file = %file.display(), pairs = pairs.len(), "paired markers");
    Ok(pairs)
}

/// Phase two: turn one declaration into a host signature.
fn resolve_host(prefix: &str, resolver: &Resolver<'_>, decl: &Decl<'_>) -> std::result::Result<HostSignature, String> {
    match decl {
        Decl::Function(sig) => {
            if !sig.generics.params.is_empty() {
                return Err(format!("generic function '{}' cannot cross the boundary", sig.ident));
            }
            if sig.variadic.is_some() {
                return Err(format!("variadic function '{}' cannot cross the boundary", sig.ident));
            }
            let mut arguments = Vec::with_capacity(sig.inputs.len());
            for input in &sig.inputs {
                match input {
                    FnArg::Receiver(_) => {
                        return Err("methods with a receiver are not supported".to_string())
                    }
                    FnArg::Typed(typed) => {
                        let name = pattern_name(&typed.pat)?;
                        arguments.push(resolver.argument(&name, &typed.ty)?);
                    }
                }
            }
            Ok(HostSignature {
                name: sig.ident.to_string(),
                arguments,
                results: resolver.results(&sig.output)?,
            })
        }
        Decl::Struct(item) => Ok(HostSignature {
            name: item.ident.to_string(),
            arguments: export_fields(prefix, resolver, item)?,
            results: Vec::new(),
        }),
        Decl::Other(what) => Err(format!("cannot annotate a {what}")),
    }
}

fn export_fields(prefix: &str, resolver: &Resolver<'_>, item: &syn::ItemStruct) -> std::result::Result<Vec<Argument>, String> {
    if !item.generics.params.is_empty() {
        return Err(format!("generic struct '{}' cannot be exported", item.ident));
    }
    let syn::Fields::Named(fields) = &item.fields else {
        return Err(format!("exported struct '{}' must have named fields", item.ident));
    };

    let filler_ok = fields.named.first().is_some_and(|first| {
        let named_filler = first
            .ident
            .as_ref()
            .is_some_and(|ident| ident.to_string().starts_with('_'));
        let eight_bytes = matches!(&first.ty, Type::Path(p) if p.qself.is_none() && p.path.is_ident("u64"));
        named_filler && eight_bytes
    });
    if !filler_ok {
        return Err(format!(
            "exported struct '{}' must start with an unnamed 8-byte filler field (`_: u64`)",
            item.ident
        ));
    }

    fields
        .named
        .iter()
        .map(|field| {
            let ident = field.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
            let name = if ident.starts_with('_') { DISCARD_NAME.to_string() } else { ident };
            let argument = resolver.argument(&name, &field.ty)?;
            Ok(argument.with_tag(doc_tag(prefix, &field.attrs)))
        })
        .collect()
}

fn pattern_name(pat: &Pat) -> std::result::Result<String, String> {
    match pat {
        Pat::Ident(ident) => Ok(ident.ident.to_string()),
        Pat::Wild(_) => Ok(DISCARD_NAME.to_string()),
        _ => Err("parameter patterns other than identifiers are not supported".to_string()),
    }
}

/// Extract `name` from a doc line containing `<prefix>:"name"`.
fn doc_tag(prefix: &str, attrs: &[Attribute]) -> Option<String> {
    let lead = format!("{prefix}:\"");
    attrs.iter().find_map(|attr| {
        let Meta::NameValue(doc) = &attr.meta else {
            return None;
        };
        if !doc.path.is_ident("doc") {
            return None;
        }
        let Expr::Lit(ExprLit { lit: Lit::Str(text), .. }) = &doc.value else {
            return None;
        };
        let text = text.value();
        let rest = &text[text.find(&lead)? + lead.len()..];
        let name = &rest[..rest.find('"')?];
        (!name.is_empty()).then(|| name.to_string())
    })
}

fn path_attr(attrs: &[Attribute]) -> Option<String> {
    attrs.iter().find_map(|attr| match &attr.meta {
        Meta::NameValue(nv) if nv.path.is_ident("path") => match &nv.value {
            Expr::Lit(ExprLit { lit: Lit::Str(path), .. }) => Some(path.value()),
            _ => None,
        },
        _ => None,
    })
}

fn has_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg") && attr.parse_args::<Meta>().is_ok_and(|meta| cfg_requires_test(&meta))
    })
}

/// Whether a cfg predicate can only hold in test builds.
fn cfg_requires_test(meta: &Meta) -> bool {
    match meta {
        Meta::Path(path) => path.is_ident("test"),
        Meta::List(list) if list.path.is_ident("all") => list
            .parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
            .is_ok_and(|nested| nested.iter().any(cfg_requires_test)),
        _ => false,
    }
}

fn item_attrs(item: &syn::Item) -> &[Attribute] {
    match item {
        syn::Item::Const(i) => &i.attrs,
        syn::Item::Enum(i) => &i.attrs,
        syn::Item::ExternCrate(i) => &i.attrs,
        syn::Item::Fn(i) => &i.attrs,
        syn::Item::ForeignMod(i) => &i.attrs,
        syn::Item::Impl(i) => &i.attrs,
        syn::Item::Macro(i) => &i.attrs,
        syn::Item::Mod(i) => &i.attrs,
        syn::Item::Static(i) => &i.attrs,
        syn::Item::Struct(i) => &i.attrs,
        syn::Item::Trait(i) => &i.attrs,
        syn::Item::TraitAlias(i) => &i.attrs,
        syn::Item::Type(i) => &i.attrs,
        syn::Item::Union(i) => &i.attrs,
        syn::Item::Use(i) => &i.attrs,
        _ => &[],
    }
}

fn foreign_attrs(item: &syn::ForeignItem) -> &[Attribute] {
    match item {
        syn::ForeignItem::Fn(i) => &i.attrs,
        syn::ForeignItem::Static(i) => &i.attrs,
        syn::ForeignItem::Type(i) => &i.attrs,
        syn::ForeignItem::Macro(i) => &i.attrs,
        _ => &[],
    }
}

fn item_kind(item: &syn::Item) -> &'static str {
    match item {
        syn::Item::Const(_) => "const",
        syn::Item::Enum(_) => "enum",
        syn::Item::ExternCrate(_) => "extern crate",
        syn::Item::Impl(_) => "impl block",
        syn::Item::Macro(_) => "macro invocation",
        syn::Item::Static(_) => "static",
        syn::Item::Trait(_) => "trait",
        syn::Item::TraitAlias(_) => "trait alias",
        syn::Item::Type(_) => "type alias",
        syn::Item::Union(_) => "union",
        syn::Item::Use(_) => "use declaration",
        _ => "item",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwasm_bind::{Mode, OBJECT_TYPE};

    fn ctx(include_tests: bool) -> FileContext<'static> {
        FileContext {
            prefix: "inkwasm",
            in_runtime: false,
            include_tests,
            file_is_test: false,
        }
    }

    fn parse(src: &str) -> Result<ParsedFile> {
        parse_source(&ctx(true), Path::new("src/lib.rs"), src)
    }

    fn err(src: &str) -> String {
        parse(src).unwrap_err().to_string()
    }

    #[test]
    fn foreign_and_free_functions() {
        let src = r#"
use inkwasm::Object;

extern "C" {
    //inkwasm:func globalThis.alert
    fn alert(message: &str);

    /// Reads a property.
    //inkwasm:get .length
    #[allow(dead_code)]
    fn length(o: Object) -> (u32, bool);
}

//inkwasm:new globalThis.Uint8Array
pub fn new_bytes(_: u32) -> Object {
    unimplemented!()
}
"#;
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.functions.len(), 3);

        let alert = &parsed.functions[0];
        assert_eq!(alert.line, 6);
        assert_eq!(alert.host.name, "alert");
        assert_eq!(alert.host.arguments[0].type_name(), "str");
        assert_eq!(alert.script.hint, Hint::Func);
        assert_eq!(alert.script.path, "globalThis.alert");

        let length = &parsed.functions[1];
        assert_eq!(length.line, 11);
        assert_eq!(length.host.arguments[0].type_name(), OBJECT_TYPE);
        assert_eq!(length.host.results.len(), 2);

        let new_bytes = &parsed.functions[2];
        assert_eq!(new_bytes.script.hint, Hint::New);
        assert!(new_bytes.host.arguments[0].is_discard());
    }

    #[test]
    fn markers_inside_bodies_are_ignored() {
        let src = r#"
fn helper() {
    //inkwasm:func nothing
    let _x = 1;
}
"#;
        assert!(parse(src).unwrap().functions.is_empty());
    }

    #[test]
    fn export_struct_with_tags() {
        let src = r#"
//inkwasm:export
#[repr(C)]
pub struct Point {
    _pad: u64,
    /// inkwasm:"x_pos"
    pub x: f64,
    pub y: f64,
    pub data: [u8; 4],
}
"#;
        let parsed = parse(src).unwrap();
        let point = &parsed.functions[0];
        assert_eq!(point.script.hint, Hint::Export);
        assert_eq!(point.line, 4);
        let fields = &point.host.arguments;
        assert!(fields[0].is_discard());
        assert_eq!(fields[1].script_name(), "x_pos");
        assert_eq!(fields[2].script_name(), "y");
        assert_eq!(fields[3].mode(), Mode::Array);
    }

    #[test]
    fn export_requires_filler() {
        let src = "//inkwasm:export\nstruct P {\n    x: f64,\n}\n";
        assert_eq!(
            err(src),
            "src/lib.rs:2: exported struct 'P' must start with an unnamed 8-byte filler field (`_: u64`)"
        );
        let src = "//inkwasm:export\nstruct P {\n    _pad: u32,\n    x: f64,\n}\n";
        assert!(err(src).contains("filler"));
        let src = "//inkwasm:export\nstruct P(u64, f64);\n";
        assert!(err(src).contains("named fields"));
    }

    #[test]
    fn unsupported_shapes_cite_declaration_line() {
        let src = "\n\n//inkwasm:func f\nfn f(p: &&u8) {}\n";
        assert_eq!(err(src), "src/lib.rs:4: pointer to pointer is not supported");

        let src = "//inkwasm:func f\nfn f(p: Vec<&u8>) {}\n";
        assert_eq!(err(src), "src/lib.rs:2: slice of pointers is not supported");

        let src = "const N: usize = 2;\n//inkwasm:func f\nfn f(p: [u8; N]) {}\n";
        assert!(err(src).starts_with("src/lib.rs:3: invalid array length"));
    }

    #[test]
    fn pairing_errors() {
        assert_eq!(
            err("//inkwasm:export\nfn f() {}\n"),
            "src/lib.rs:1: //inkwasm:export must precede a struct declaration, found function"
        );
        assert_eq!(
            err("//inkwasm:func f\nconst X: u8 = 1;\n"),
            "src/lib.rs:1: //inkwasm:func must precede a function declaration, found const"
        );
        assert_eq!(
            err("fn a() {}\n//inkwasm:func f\n"),
            "src/lib.rs:2: //inkwasm:func is not followed by a declaration"
        );
        assert_eq!(
            err("//inkwasm:func f\n//inkwasm:func g\nfn g() {}\n"),
            "src/lib.rs:1: marker is followed by another marker at line 2"
        );
        assert!(err("//inkwasm:call f\nfn f() {}\n").starts_with("src/lib.rs:1: malformed marker"));
    }

    #[test]
    fn non_identifier_patterns_rejected() {
        let src = "impl X {\n}\n//inkwasm:func f\nfn f((a, b): (u8, u8)) {}\n";
        assert!(err(src).contains("parameter patterns"));
    }

    #[test]
    fn test_scoped_declarations() {
        let src = r#"
//inkwasm:func release
fn release() {}

#[cfg(test)]
mod tests {
    //inkwasm:func only_in_tests
    fn only_in_tests() {}
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests;

#[cfg(not(test))]
mod not_tests;
"#;
        let with = parse_source(&ctx(true), Path::new("src/lib.rs"), src).unwrap();
        assert_eq!(with.functions.len(), 2);
        assert!(!with.functions[0].is_test);
        assert!(with.functions[1].is_test);
        assert_eq!(with.modules.len(), 2);
        assert!(with.modules[0].is_test);
        assert!(!with.modules[1].is_test);

        let without = parse_source(&ctx(false), Path::new("src/lib.rs"), src).unwrap();
        assert_eq!(without.functions.len(), 1);
        assert_eq!(without.modules.len(), 1);
        assert_eq!(without.modules[0].name, "not_tests");
    }

    #[test]
    fn module_declarations_record_path_and_nesting() {
        let src = r#"
#[path = "platform/web.rs"]
mod web;

mod outer {
    mod inner;
}
"#;
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.modules[0].path_attr.as_deref(), Some("platform/web.rs"));
        assert_eq!(parsed.modules[1].name, "inner");
        assert_eq!(parsed.modules[1].nesting, vec!["outer".to_string()]);
    }

    #[test]
    fn syntax_errors_are_located() {
        let e = parse("fn broken() -> {}\n").unwrap_err();
        assert!(matches!(e, ParseError::Syntax { .. }));
        assert!(e.to_string().starts_with("src/lib.rs:"));
    }
}
