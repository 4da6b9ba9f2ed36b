use crate::Ident;
use crate::ast::node::{self as ast, DeclarationKind, ForHead, ForInit, Statement};

/// Every name declared with `var` in `body`, outside nested functions, in source order.
pub fn var_names(body: &[Statement]) -> Vec<Ident> {
    let mut names = Vec::new();
    body.iter().for_each(|stmt| collect(stmt, &mut names));
    names
}

fn collect_declaration(decl: &ast::VariableDeclaration, names: &mut Vec<Ident>) {
    if decl.kind != DeclarationKind::Var {
        return;
    }
    for declarator in &decl.declarations {
        for name in declarator.id.bound_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
}

fn collect(stmt: &Statement, names: &mut Vec<Ident>) {
    match stmt {
        Statement::VariableDeclaration(decl) => collect_declaration(decl, names),
        Statement::BlockStatement(block) => block.body.iter().for_each(|s| collect(s, names)),
        Statement::IfStatement(s) => {
            collect(&s.consequent, names);
            if let Some(alternate) = &s.alternate {
                collect(alternate, names);
            }
        }
        Statement::LabeledStatement(s) => collect(&s.body, names),
        Statement::WhileStatement(s) | Statement::DoWhileStatement(s) => collect(&s.body, names),
        Statement::ForStatement(s) => {
            if let Some(ForInit::VariableDeclaration(decl)) = &s.init {
                collect_declaration(decl, names);
            }
            collect(&s.body, names);
        }
        Statement::ForInStatement(s) | Statement::ForOfStatement(s) => {
            if let ForHead::VariableDeclaration(decl) = &s.left {
                collect_declaration(decl, names);
            }
            collect(&s.body, names);
        }
        Statement::SwitchStatement(s) => s
            .cases
            .iter()
            .flat_map(|case| case.consequent.iter())
            .for_each(|s| collect(s, names)),
        Statement::TryStatement(s) => {
            s.block.body.iter().for_each(|s| collect(s, names));
            if let Some(handler) = &s.handler {
                handler.body.body.iter().for_each(|s| collect(s, names));
            }
            if let Some(finalizer) = &s.finalizer {
                finalizer.body.iter().for_each(|s| collect(s, names));
            }
        }
        Statement::ExpressionStatement(_)
        | Statement::EmptyStatement(_)
        | Statement::DebuggerStatement(_)
        | Statement::ReturnStatement(_)
        | Statement::BreakStatement(_)
        | Statement::ContinueStatement(_)
        | Statement::ThrowStatement(_)
        | Statement::FunctionDeclaration(_)
        | Statement::ClassDeclaration(_)
        | Statement::WithStatement(_)
        | Statement::ImportDeclaration(_)
        | Statement::ExportNamedDeclaration(_)
        | Statement::ExportDefaultDeclaration(_)
        | Statement::ExportAllDeclaration(_) => {}
    }
}
