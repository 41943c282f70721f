use std::sync::Arc;

use arrow_schema::{Field, Schema};
use sluice_physical::{Plan, Step, StepId, StepKind, TeeSettings};
use sqlparser::ast::{
    BinaryOperator, Expr, FunctionArg, FunctionArgExpr, ObjectName, ObjectNamePart, Query, Select,
    SelectItem, SetExpr, Statement, TableFactor, Value,
};

use crate::store::CatalogStore;
use crate::Error;

/// Binds a parsed statement to a physical plan against the catalog.
pub(crate) struct Binder<'a> {
    store: &'a CatalogStore,
    plan: Plan,
}

impl<'a> Binder<'a> {
    pub fn new(store: &'a CatalogStore) -> Self {
        Self {
            store,
            plan: Plan::default(),
        }
    }

    pub fn bind(mut self, statement: &Statement) -> error_stack::Result<Plan, Error> {
        let Statement::Query(query) = statement else {
            error_stack::bail!(Error::unsupported("only SELECT queries are supported"));
        };
        self.bind_query(query)?;
        Ok(self.plan)
    }

    fn bind_query(&mut self, query: &Query) -> error_stack::Result<StepId, Error> {
        error_stack::ensure!(query.with.is_none(), Error::unsupported("WITH clauses"));
        let SetExpr::Select(select) = query.body.as_ref() else {
            error_stack::bail!(Error::unsupported("expected a SELECT body"));
        };
        self.bind_select(select)
    }

    fn bind_select(&mut self, select: &Select) -> error_stack::Result<StepId, Error> {
        error_stack::ensure!(
            select.from.len() == 1,
            Error::unsupported("exactly one FROM item")
        );
        let from = &select.from[0];
        error_stack::ensure!(from.joins.is_empty(), Error::unsupported("joins"));
        error_stack::ensure!(
            select.selection.is_none(),
            Error::unsupported("WHERE clauses")
        );

        let input = self.bind_relation(&from.relation)?;
        self.bind_projection(&select.projection, input)
    }

    fn bind_relation(&mut self, relation: &TableFactor) -> error_stack::Result<StepId, Error> {
        match relation {
            TableFactor::Table {
                name, args: None, ..
            } => {
                let table_name = single_ident(name)?;
                let schema = self
                    .store
                    .schema(&table_name)
                    .ok_or_else(|| error_stack::report!(Error::NoSuchTable(table_name.clone())))?;
                Ok(self.push_step(StepKind::Scan { table_name }, vec![], schema))
            }
            TableFactor::Table {
                name,
                args: Some(args),
                ..
            } => {
                let function = single_ident(name)?;
                error_stack::ensure!(
                    function.eq_ignore_ascii_case("tee"),
                    Error::NoSuchFunction(function)
                );
                self.bind_tee(&args.args)
            }
            TableFactor::Derived { subquery, .. } => self.bind_query(subquery),
            other => error_stack::bail!(Error::unsupported(format!(
                "table factor {other}"
            ))),
        }
    }

    /// Bind a `tee(<subquery>, <options...>)` invocation.
    ///
    /// Exactly one positional argument -- the subquery -- is expected; every
    /// other argument must be a named option. The options are resolved here,
    /// once, into the settings carried on the tee step.
    fn bind_tee(&mut self, args: &[FunctionArg]) -> error_stack::Result<StepId, Error> {
        let mut subquery = None;
        let mut settings = TeeSettings::default();

        for arg in args {
            match arg {
                FunctionArg::Named {
                    name,
                    arg: FunctionArgExpr::Expr(value),
                    ..
                } => set_option(&mut settings, &name.value, value)?,
                FunctionArg::ExprNamed {
                    name: Expr::Identifier(name),
                    arg: FunctionArgExpr::Expr(value),
                    ..
                } => set_option(&mut settings, &name.value, value)?,
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => {
                    match unwrap_nested(expr) {
                        Expr::Subquery(query) => {
                            error_stack::ensure!(subquery.is_none(), Error::TeeArguments);
                            subquery = Some(query);
                        }
                        // The DuckDB grammar also admits `name = value` for
                        // named arguments; it reaches us as a comparison.
                        Expr::BinaryOp {
                            left,
                            op: BinaryOperator::Eq,
                            right,
                        } => {
                            let Expr::Identifier(name) = left.as_ref() else {
                                error_stack::bail!(Error::TeeArguments);
                            };
                            set_option(&mut settings, &name.value, right)?;
                        }
                        _ => error_stack::bail!(Error::TeeArguments),
                    }
                }
                _ => error_stack::bail!(Error::TeeArguments),
            }
        }

        let Some(query) = subquery else {
            error_stack::bail!(Error::TeeArguments);
        };
        let input = self.bind_query(query)?;
        let schema = self.plan.steps[input].schema.clone();
        Ok(self.push_step(StepKind::Tee { settings }, vec![input], schema))
    }

    fn bind_projection(
        &mut self,
        projection: &[SelectItem],
        input: StepId,
    ) -> error_stack::Result<StepId, Error> {
        if matches!(projection, [SelectItem::Wildcard(_)]) {
            return Ok(input);
        }

        let input_schema = self.plan.steps[input].schema.clone();
        let mut columns = Vec::with_capacity(projection.len());
        let mut fields = Vec::with_capacity(projection.len());
        for item in projection {
            let (expr, alias) = match item {
                SelectItem::UnnamedExpr(expr) => (expr, None),
                SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias.value.clone())),
                other => {
                    error_stack::bail!(Error::unsupported(format!("projection item {other}")))
                }
            };
            let Expr::Identifier(ident) = expr else {
                error_stack::bail!(Error::unsupported(
                    "only column references in the projection"
                ));
            };
            let Ok(index) = input_schema.index_of(&ident.value) else {
                error_stack::bail!(Error::NoSuchColumn(ident.value.clone()));
            };
            let field = input_schema.field(index);
            let field = match alias {
                Some(alias) => Field::new(alias, field.data_type().clone(), field.is_nullable()),
                None => field.clone(),
            };
            columns.push(ident.value.clone());
            fields.push(field);
        }

        let schema = Arc::new(Schema::new(fields));
        Ok(self.push_step(StepKind::Project { columns }, vec![input], schema))
    }

    fn push_step(
        &mut self,
        kind: StepKind,
        inputs: Vec<StepId>,
        schema: arrow_schema::SchemaRef,
    ) -> StepId {
        let id = self.plan.steps.next_idx();
        self.plan.steps.push(Step {
            id,
            kind,
            inputs,
            schema,
        })
    }
}

/// Strip redundant parenthesization from an expression.
fn unwrap_nested(mut expr: &Expr) -> &Expr {
    while let Expr::Nested(inner) = expr {
        expr = inner;
    }
    expr
}

fn single_ident(name: &ObjectName) -> error_stack::Result<String, Error> {
    match name.0.as_slice() {
        [ObjectNamePart::Identifier(ident)] => Ok(ident.value.clone()),
        _ => error_stack::bail!(Error::unsupported("qualified names")),
    }
}

fn set_option(
    settings: &mut TeeSettings,
    name: &str,
    value: &Expr,
) -> error_stack::Result<(), Error> {
    match name.to_ascii_lowercase().as_str() {
        "path" => settings.path = Some(string_option(name, value)?),
        "symbol" => settings.symbol = Some(string_option(name, value)?),
        "table_name" => settings.table_name = Some(string_option(name, value)?),
        "terminal" => settings.terminal = bool_option(name, value)?,
        "pager" => settings.pager = bool_option(name, value)?,
        _ => error_stack::bail!(Error::UnknownOption(name.to_owned())),
    }
    Ok(())
}

fn string_option(name: &str, value: &Expr) -> error_stack::Result<String, Error> {
    if let Expr::Value(value) = unwrap_nested(value) {
        if let Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) = &value.value {
            return Ok(s.clone());
        }
    }
    error_stack::bail!(Error::InvalidOptionValue(name.to_owned()))
}

fn bool_option(name: &str, value: &Expr) -> error_stack::Result<bool, Error> {
    if let Expr::Value(value) = unwrap_nested(value) {
        if let Value::Boolean(b) = &value.value {
            return Ok(*b);
        }
    }
    error_stack::bail!(Error::InvalidOptionValue(name.to_owned()))
}
