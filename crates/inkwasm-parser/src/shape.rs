//! Rust type syntax to [`Argument`] resolution.

use std::collections::HashMap;

use inkwasm_bind::{Argument, DISCARD_NAME, OBJECT_TYPE};
use quote::ToTokens;
use syn::{Expr, ExprLit, GenericArgument, Lit, PathArguments, ReturnType, Type, TypePath, UseTree};

/// Crate path of the runtime that owns the `Object` handle.
pub(crate) const RUNTIME_CRATE: &str = "inkwasm";

/// Names brought into scope by `use` declarations of one module.
#[derive(Debug, Default, Clone)]
pub(crate) struct Imports {
    names: HashMap<String, Vec<String>>,
}

impl Imports {
    /// Collect the `use` declarations among `items`.
    pub fn collect<'a>(items: impl IntoIterator<Item = &'a syn::Item>) -> Self {
        let mut imports = Imports::default();
        for item in items {
            if let syn::Item::Use(decl) = item {
                imports.add_tree(&mut Vec::new(), &decl.tree);
            }
        }
        imports
    }

    fn add_tree(&mut self, prefix: &mut Vec<String>, tree: &UseTree) {
        match tree {
            UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.add_tree(prefix, &path.tree);
                prefix.pop();
            }
            UseTree::Name(name) if name.ident == "self" => {
                if let Some(last) = prefix.last() {
                    self.names.insert(last.clone(), prefix.clone());
                }
            }
            UseTree::Name(name) => {
                let mut full = prefix.clone();
                full.push(name.ident.to_string());
                self.names.insert(name.ident.to_string(), full);
            }
            UseTree::Rename(rename) => {
                let mut full = prefix.clone();
                full.push(rename.ident.to_string());
                self.names.insert(rename.rename.to_string(), full);
            }
            UseTree::Group(group) => {
                for tree in &group.items {
                    self.add_tree(prefix, tree);
                }
            }
            UseTree::Glob(_) => {}
        }
    }
}

/// Resolves parameter, result, and field types within one module scope.
pub(crate) struct Resolver<'a> {
    imports: &'a Imports,
    in_runtime: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(imports: &'a Imports, in_runtime: bool) -> Self {
        Resolver { imports, in_runtime }
    }

    /// Resolve one parameter or field type.
    pub fn argument(&self, name: &str, ty: &Type) -> Result<Argument, String> {
        match strip(ty) {
            Type::Reference(reference) => match strip(&reference.elem) {
                Type::Slice(slice) => self.sequence(name, &slice.elem),
                elem if is_str(elem) => Ok(Argument::named(name, "str")),
                elem => self.pointer(name, elem),
            },
            Type::Ptr(ptr) => self.pointer(name, &ptr.elem),
            Type::Array(array) => {
                let length = literal_length(&array.len)?;
                let element = self.element(&array.elem, "array of pointers is not supported")?;
                Argument::array(name, element, length).map_err(|err| err.to_string())
            }
            Type::Path(path) => match vec_element(path) {
                Some(elem) => self.sequence(name, elem),
                None => Ok(Argument::named(name, self.path_name(path)?)),
            },
            Type::Tuple(tuple) if tuple.elems.is_empty() => {
                Err("unit type is only allowed as an empty result".to_string())
            }
            Type::Tuple(_) => Err(format!("tuple `{}` is only allowed in result position", render(ty))),
            other => Err(unsupported(other)),
        }
    }

    /// Resolve a function's return type; tuples become multiple results.
    pub fn results(&self, output: &ReturnType) -> Result<Vec<Argument>, String> {
        let ty = match output {
            ReturnType::Default => return Ok(Vec::new()),
            ReturnType::Type(_, ty) => strip(ty),
        };
        match ty {
            Type::Tuple(tuple) => tuple
                .elems
                .iter()
                .map(|elem| self.argument(DISCARD_NAME, elem))
                .collect(),
            other => Ok(vec![self.argument(DISCARD_NAME, other)?]),
        }
    }

    fn pointer(&self, name: &str, pointee: &Type) -> Result<Argument, String> {
        match strip(pointee) {
            Type::Reference(_) | Type::Ptr(_) => Err("pointer to pointer is not supported".to_string()),
            Type::Array(_) => Err("pointer to array is not supported".to_string()),
            Type::Slice(_) => Err("pointer to slice is not supported".to_string()),
            Type::Path(path) if vec_element(path).is_some() => {
                Err("pointer to slice is not supported".to_string())
            }
            Type::Path(path) => {
                let target = Argument::named(DISCARD_NAME, self.path_name(path)?);
                Argument::pointer(name, target).map_err(|err| err.to_string())
            }
            other => Err(unsupported(other)),
        }
    }

    fn sequence(&self, name: &str, elem: &Type) -> Result<Argument, String> {
        let element = self.element(elem, "slice of pointers is not supported")?;
        Argument::slice(name, element).map_err(|err| err.to_string())
    }

    fn element(&self, elem: &Type, pointer_message: &str) -> Result<Argument, String> {
        match strip(elem) {
            Type::Reference(_) | Type::Ptr(_) => Err(pointer_message.to_string()),
            Type::Array(_) | Type::Slice(_) => Err("nested sequences are not supported".to_string()),
            Type::Path(path) if vec_element(path).is_some() => {
                Err("nested sequences are not supported".to_string())
            }
            Type::Path(path) => Ok(Argument::named(DISCARD_NAME, self.path_name(path)?)),
            other => Err(unsupported(other)),
        }
    }

    fn path_name(&self, ty: &TypePath) -> Result<String, String> {
        if ty.qself.is_some() {
            return Err(unsupported(&Type::Path(ty.clone())));
        }
        let mut segments = Vec::with_capacity(ty.path.segments.len());
        for segment in &ty.path.segments {
            if !segment.arguments.is_none() {
                return Err(format!("unsupported generic type `{}`", render(&Type::Path(ty.clone()))));
            }
            segments.push(segment.ident.to_string());
        }

        if segments.len() == 1 && ty.path.leading_colon.is_none() {
            if let Some(full) = self.imports.names.get(&segments[0]) {
                segments = full.clone();
            } else if self.in_runtime && segments[0] == "Object" {
                return Ok(OBJECT_TYPE.to_string());
            }
        }
        Ok(self.qualify(segments))
    }

    fn qualify(&self, mut segments: Vec<String>) -> String {
        let mut local = false;
        while segments.len() > 1 && matches!(segments[0].as_str(), "crate" | "self" | "super") {
            segments.remove(0);
            local = true;
        }
        let last = segments.last().cloned().unwrap_or_default();
        if last == "Object" && ((local && self.in_runtime) || segments[0] == RUNTIME_CRATE) {
            return OBJECT_TYPE.to_string();
        }
        if matches!(segments[0].as_str(), "std" | "core" | "alloc") {
            return last;
        }
        segments.join(".")
    }
}

fn strip(ty: &Type) -> &Type {
    match ty {
        Type::Paren(inner) => strip(&inner.elem),
        Type::Group(inner) => strip(&inner.elem),
        other => other,
    }
}

fn is_str(ty: &Type) -> bool {
    matches!(ty, Type::Path(path) if path.qself.is_none() && path.path.is_ident("str"))
}

/// The element type of `Vec<T>`, if `path` names a vector.
fn vec_element(path: &TypePath) -> Option<&Type> {
    let last = path.path.segments.last()?;
    if path.qself.is_some() || last.ident != "Vec" {
        return None;
    }
    match &last.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first() {
            Some(GenericArgument::Type(elem)) => Some(elem),
            _ => None,
        },
        _ => None,
    }
}

fn literal_length(len: &Expr) -> Result<u64, String> {
    match len {
        Expr::Lit(ExprLit { lit: Lit::Int(int), .. }) => int
            .base10_parse::<u64>()
            .map_err(|err| format!("invalid array length: {err}")),
        Expr::Paren(inner) => literal_length(&inner.expr),
        Expr::Group(inner) => literal_length(&inner.expr),
        other => Err(format!(
            "invalid array length `{}`: the size must be an integer literal, not a constant",
            other.to_token_stream()
        )),
    }
}

fn render(ty: &Type) -> String {
    ty.to_token_stream().to_string()
}

fn unsupported(ty: &Type) -> String {
    format!("unsupported type `{}`", render(ty))
}
