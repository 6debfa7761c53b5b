//! Evaluator for accepted code.
//!
//! Executes a parsed program against a fixed namespace: the dataset clone
//! plus the three handles. Name resolution never leaves that environment,
//! so accepted code has no path to the host process. Everything `print`
//! writes lands in an in-memory buffer that becomes the execution result;
//! visual artifacts go through the `RenderSink` collaborator.

use std::collections::HashMap;

use crate::dataset::{format_float, Datum, Frame};
use crate::render::{ChartKind, FigureSpec, RenderSink};

use super::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, UnaryOp};
use super::value::{
    aggregate, aggregate_grouped, group_keys, py_str, AggOp, GroupBy, GroupedSeries, Handle,
    Series, Value,
};

type Exec<T> = Result<T, String>;

pub struct Interpreter<'a> {
    env: HashMap<String, Value>,
    out: String,
    fig: FigureSpec,
    sink: &'a mut dyn RenderSink,
}

impl<'a> Interpreter<'a> {
    /// Build the execution namespace: exactly `df`, `plt`, `sns`, `st`.
    pub fn new(dataset: Frame, sink: &'a mut dyn RenderSink) -> Self {
        let mut env = HashMap::new();
        env.insert("df".to_string(), Value::Frame(dataset));
        env.insert("plt".to_string(), Value::Module(Handle::Pyplot));
        env.insert("sns".to_string(), Value::Module(Handle::Seaborn));
        env.insert("st".to_string(), Value::Module(Handle::Display));
        Self {
            env,
            out: String::new(),
            fig: FigureSpec::blank(),
            sink,
        }
    }

    /// Run to completion and return the captured output. A failure
    /// discards any partially captured text.
    pub fn run(mut self, program: &[Stmt]) -> Exec<String> {
        self.exec_block(program)?;
        Ok(self.out)
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Exec<()> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Exec<()> {
        match stmt {
            Stmt::Import(names) => {
                for name in names {
                    let value = resolve_module(&name.module)?;
                    self.env.insert(name.binding().to_string(), value);
                }
                Ok(())
            }
            Stmt::FromImport { module, names } => {
                for name in names {
                    let value = resolve_member(module, &name.module)?;
                    let binding = name.alias.clone().unwrap_or_else(|| name.module.clone());
                    self.env.insert(binding, value);
                }
                Ok(())
            }
            Stmt::Assign { target, value } => self.assign(target, value),
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(())
            }
            Stmt::For { var, iter, body } => {
                let iterable = self.eval(iter)?;
                for item in iter_values(iterable)? {
                    self.env.insert(var.clone(), item);
                    self.exec_block(body)?;
                }
                Ok(())
            }
            Stmt::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy()? {
                        return self.exec_block(body);
                    }
                }
                self.exec_block(orelse)
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> Exec<()> {
        match target {
            Expr::Name(name) => {
                let v = self.eval(value)?;
                self.env.insert(name.clone(), v);
                Ok(())
            }
            Expr::Subscript { value: base, index } => {
                let Expr::Name(name) = &**base else {
                    return Err("unsupported assignment target".into());
                };
                let column = match self.eval(index)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(format!(
                            "column names must be strings, not {}",
                            other.type_name()
                        ))
                    }
                };
                let v = self.eval(value)?;
                let rows = match self.env.get(name) {
                    Some(Value::Frame(f)) => f.n_rows(),
                    Some(other) => {
                        return Err(format!(
                            "cannot assign into a {} with []",
                            other.type_name()
                        ))
                    }
                    None => return Err(name_error(name)),
                };
                let cells = column_cells(v, rows)?;
                if let Some(Value::Frame(f)) = self.env.get_mut(name) {
                    f.set_column(&column, cells)?;
                }
                Ok(())
            }
            _ => Err("unsupported assignment target".into()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::Name(n) => self.env.get(n).cloned().ok_or_else(|| name_error(n)),
            Expr::Tuple(items) => Ok(Value::Tuple(self.eval_all(items)?)),
            Expr::List(items) => Ok(Value::List(self.eval_all(items)?)),
            Expr::Attribute { value, attr } => {
                let v = self.eval(value)?;
                attribute(&v, attr)
            }
            Expr::Subscript { value, index } => {
                let v = self.eval(value)?;
                let i = self.eval(index)?;
                subscript(v, i)
            }
            Expr::Call { func, args, kwargs } => self.eval_call(func, args, kwargs),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                unary(*op, v)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(l, *op, r)
            }
            Expr::Compare { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                compare(l, *op, r)
            }
            Expr::Logic { op, left, right } => {
                let l = self.eval(left)?;
                match op {
                    BoolOp::And => {
                        if l.truthy()? {
                            self.eval(right)
                        } else {
                            Ok(l)
                        }
                    }
                    BoolOp::Or => {
                        if l.truthy()? {
                            Ok(l)
                        } else {
                            self.eval(right)
                        }
                    }
                }
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Exec<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_kwargs(&mut self, kwargs: &[(String, Expr)]) -> Exec<Vec<(String, Value)>> {
        kwargs
            .iter()
            .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
            .collect()
    }

    fn eval_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Exec<Value> {
        match func {
            Expr::Name(name) if is_builtin(name) && !self.env.contains_key(name) => {
                let argv = self.eval_all(args)?;
                self.builtin(name, argv)
            }
            Expr::Name(name) => {
                let v = self
                    .env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| name_error(name))?;
                Err(format!("'{}' object is not callable", v.type_name()))
            }
            Expr::Attribute { value, attr } => {
                let obj = self.eval(value)?;
                let argv = self.eval_all(args)?;
                let kwv = self.eval_kwargs(kwargs)?;
                self.method(obj, attr, argv, kwv)
            }
            other => {
                let v = self.eval(other)?;
                Err(format!("'{}' object is not callable", v.type_name()))
            }
        }
    }

    fn builtin(&mut self, name: &str, argv: Vec<Value>) -> Exec<Value> {
        match name {
            "print" => {
                let parts: Vec<String> = argv.iter().map(py_str).collect();
                self.out.push_str(&parts.join(" "));
                self.out.push('\n');
                Ok(Value::None)
            }
            "len" => {
                let [v] = one_arg(argv, "len")?;
                let n = match &v {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) | Value::Tuple(items) => items.len(),
                    Value::Series(s) => s.len(),
                    Value::Frame(f) => f.n_rows(),
                    other => {
                        return Err(format!("object of type '{}' has no len()", other.type_name()))
                    }
                };
                Ok(Value::Int(n as i64))
            }
            "range" => {
                let ints: Vec<i64> = argv
                    .iter()
                    .map(|v| match v {
                        Value::Int(n) => Ok(*n),
                        other => Err(format!(
                            "range() arguments must be integers, not {}",
                            other.type_name()
                        )),
                    })
                    .collect::<Exec<_>>()?;
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err("range() takes 1 to 3 arguments".into()),
                };
                if step == 0 {
                    return Err("range() step must not be zero".into());
                }
                let mut items = Vec::new();
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    items.push(Value::Int(i));
                    i += step;
                }
                Ok(Value::List(items))
            }
            "round" => {
                let (v, digits) = match argv.len() {
                    1 => (argv.into_iter().next().unwrap_or(Value::None), None),
                    2 => {
                        let mut it = argv.into_iter();
                        let v = it.next().unwrap_or(Value::None);
                        match it.next() {
                            Some(Value::Int(d)) => (v, Some(d)),
                            _ => return Err("round() digits must be an integer".into()),
                        }
                    }
                    _ => return Err("round() takes 1 or 2 arguments".into()),
                };
                let n = v
                    .as_number()
                    .ok_or_else(|| format!("cannot round a {}", v.type_name()))?;
                match digits {
                    Some(d) => {
                        let factor = 10f64.powi(d as i32);
                        Ok(Value::Float((n * factor).round() / factor))
                    }
                    None => Ok(Value::Int(n.round() as i64)),
                }
            }
            "sum" => {
                let [v] = one_arg(argv, "sum")?;
                match v {
                    Value::List(items) | Value::Tuple(items) => {
                        let mut total = 0f64;
                        let mut all_int = true;
                        for item in &items {
                            match item {
                                Value::Int(_) | Value::Bool(_) => {}
                                Value::Float(_) => all_int = false,
                                other => {
                                    return Err(format!(
                                        "cannot sum a {} element",
                                        other.type_name()
                                    ))
                                }
                            }
                            total += item.as_number().unwrap_or(0.0);
                        }
                        if all_int {
                            Ok(Value::Int(total as i64))
                        } else {
                            Ok(Value::Float(total))
                        }
                    }
                    Value::Series(s) => {
                        Ok(Value::from_datum(&aggregate(&s.values, AggOp::Sum, &s.name)?))
                    }
                    other => Err(format!("'{}' object is not iterable", other.type_name())),
                }
            }
            _ => Err(name_error(name)),
        }
    }

    fn method(
        &mut self,
        obj: Value,
        attr: &str,
        argv: Vec<Value>,
        kwv: Vec<(String, Value)>,
    ) -> Exec<Value> {
        match obj {
            Value::Frame(f) => frame_method(&f, attr, argv, kwv),
            Value::Series(s) => series_method(&s, attr, argv),
            Value::GroupBy(g) => groupby_method(&g, attr),
            Value::GroupedSeries(g) => grouped_method(&g, attr),
            Value::Module(Handle::Pyplot) => self.pyplot_method(attr, argv),
            Value::Module(Handle::Seaborn) => self.seaborn_method(attr, argv, kwv),
            Value::Module(Handle::Display) => self.display_method(attr, argv),
            Value::Module(Handle::Pandas) => {
                Err(format!("the pandas binding does not support '{}'", attr))
            }
            other => Err(format!(
                "'{}' object has no method '{}'",
                other.type_name(),
                attr
            )),
        }
    }

    fn pyplot_method(&mut self, attr: &str, argv: Vec<Value>) -> Exec<Value> {
        match attr {
            "figure" => {
                self.fig = FigureSpec::blank();
                Ok(Value::None)
            }
            "clf" | "close" => {
                self.fig = FigureSpec::blank();
                Ok(Value::None)
            }
            "title" => {
                self.fig.title = Some(first_as_text(&argv, "title")?);
                Ok(Value::None)
            }
            "xlabel" => {
                self.fig.xlabel = Some(first_as_text(&argv, "xlabel")?);
                Ok(Value::None)
            }
            "ylabel" => {
                self.fig.ylabel = Some(first_as_text(&argv, "ylabel")?);
                Ok(Value::None)
            }
            "show" => {
                self.sink.figure(self.fig.clone());
                Ok(Value::None)
            }
            // layout helpers: accepted so common generated code runs, nothing to do
            "legend" | "grid" | "tight_layout" | "use" | "xticks" | "yticks" => Ok(Value::None),
            other => Err(format!("unsupported pyplot operation '{}'", other)),
        }
    }

    fn seaborn_method(
        &mut self,
        attr: &str,
        argv: Vec<Value>,
        kwv: Vec<(String, Value)>,
    ) -> Exec<Value> {
        match attr {
            "barplot" => {
                let x = kw_str(&kwv, "x", attr)?;
                let y = kw_str(&kwv, "y", attr)?;
                let data = kw_frame(&kwv, &argv, attr)?;
                let series = aggregate_grouped(&data, &x, &y, AggOp::Mean)?;
                self.fig.kind = ChartKind::Bar;
                self.fig.points = series
                    .index
                    .iter()
                    .zip(&series.values)
                    .filter_map(|(k, v)| v.as_f64().map(|f| (k.to_string(), f)))
                    .collect();
                self.fig.xlabel = Some(x);
                self.fig.ylabel = Some(y);
                Ok(Value::None)
            }
            "countplot" => {
                let x = kw_str(&kwv, "x", attr)?;
                let data = kw_frame(&kwv, &argv, attr)?;
                let keys = group_keys(&data, &x)?;
                let column = &data
                    .column(&x)
                    .ok_or_else(|| format!("unknown column '{}'", x))?
                    .values;
                self.fig.kind = ChartKind::Bar;
                self.fig.points = keys
                    .iter()
                    .map(|k| {
                        let n = column.iter().filter(|c| c.loose_eq(k)).count();
                        (k.to_string(), n as f64)
                    })
                    .collect();
                self.fig.xlabel = Some(x);
                self.fig.ylabel = Some("count".into());
                Ok(Value::None)
            }
            "histplot" => {
                let x = kw_str(&kwv, "x", attr)?;
                let data = kw_frame(&kwv, &argv, attr)?;
                let bins = match kw_get(&kwv, "bins") {
                    Some(Value::Int(n)) if *n > 0 => *n as usize,
                    Some(_) => return Err("histplot bins must be a positive integer".into()),
                    None => 10,
                };
                let column = data
                    .column(&x)
                    .ok_or_else(|| format!("unknown column '{}'", x))?;
                let numbers: Vec<f64> =
                    column.values.iter().filter_map(|d| d.as_f64()).collect();
                if numbers.is_empty() {
                    return Err(format!("column '{}' has no numeric values to bin", x));
                }
                let lo = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                let hi = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };
                let mut counts = vec![0usize; bins];
                for n in &numbers {
                    let mut idx = ((n - lo) / width) as usize;
                    if idx >= bins {
                        idx = bins - 1;
                    }
                    counts[idx] += 1;
                }
                self.fig.kind = ChartKind::Hist;
                self.fig.points = counts
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let a = lo + width * i as f64;
                        let b = a + width;
                        (
                            format!("[{}, {})", format_float(a), format_float(b)),
                            *c as f64,
                        )
                    })
                    .collect();
                self.fig.xlabel = Some(x);
                self.fig.ylabel = Some("count".into());
                Ok(Value::None)
            }
            "scatterplot" => {
                let x = kw_str(&kwv, "x", attr)?;
                let y = kw_str(&kwv, "y", attr)?;
                let data = kw_frame(&kwv, &argv, attr)?;
                let xs = &data
                    .column(&x)
                    .ok_or_else(|| format!("unknown column '{}'", x))?
                    .values;
                let ys = &data
                    .column(&y)
                    .ok_or_else(|| format!("unknown column '{}'", y))?
                    .values;
                self.fig.kind = ChartKind::Scatter;
                self.fig.points = xs
                    .iter()
                    .zip(ys)
                    .filter_map(|(a, b)| b.as_f64().map(|f| (a.to_string(), f)))
                    .collect();
                self.fig.xlabel = Some(x);
                self.fig.ylabel = Some(y);
                Ok(Value::None)
            }
            other => Err(format!("unsupported seaborn operation '{}'", other)),
        }
    }

    fn display_method(&mut self, attr: &str, argv: Vec<Value>) -> Exec<Value> {
        match attr {
            // the argument is conventionally `plt`; the current figure is taken
            "pyplot" => {
                self.sink.figure(self.fig.clone());
                Ok(Value::None)
            }
            "write" | "text" => {
                let parts: Vec<String> = argv.iter().map(py_str).collect();
                self.sink.text(parts.join(" "));
                Ok(Value::None)
            }
            "dataframe" => match argv.into_iter().next() {
                Some(Value::Frame(f)) => {
                    self.sink.table(f.preview(10));
                    Ok(Value::None)
                }
                _ => Err("st.dataframe expects a dataframe argument".into()),
            },
            other => Err(format!("unsupported display operation '{}'", other)),
        }
    }
}

fn name_error(name: &str) -> String {
    format!("name '{}' is not defined", name)
}

fn is_builtin(name: &str) -> bool {
    matches!(name, "print" | "len" | "range" | "round" | "sum")
}

fn one_arg(argv: Vec<Value>, what: &str) -> Exec<[Value; 1]> {
    let mut it = argv.into_iter();
    match (it.next(), it.next()) {
        (Some(v), Option::None) => Ok([v]),
        _ => Err(format!("{}() takes exactly one argument", what)),
    }
}

fn first_as_text(argv: &[Value], what: &str) -> Exec<String> {
    argv.first()
        .map(py_str)
        .ok_or_else(|| format!("{}() needs an argument", what))
}

fn kw_get<'v>(kwv: &'v [(String, Value)], key: &str) -> Option<&'v Value> {
    kwv.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn kw_str(kwv: &[(String, Value)], key: &str, what: &str) -> Exec<String> {
    match kw_get(kwv, key) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(format!(
            "{} argument '{}' must be a column name, not {}",
            what,
            key,
            other.type_name()
        )),
        Option::None => Err(format!("{} requires the '{}' argument", what, key)),
    }
}

fn kw_frame(kwv: &[(String, Value)], argv: &[Value], what: &str) -> Exec<Frame> {
    if let Some(Value::Frame(f)) = kw_get(kwv, "data") {
        return Ok(f.clone());
    }
    if let Some(Value::Frame(f)) = argv.first() {
        return Ok(f.clone());
    }
    Err(format!("{} requires the 'data' argument", what))
}

fn resolve_module(module: &str) -> Exec<Value> {
    match module {
        "matplotlib.pyplot" | "matplotlib" => Ok(Value::Module(Handle::Pyplot)),
        "seaborn" => Ok(Value::Module(Handle::Seaborn)),
        "streamlit" => Ok(Value::Module(Handle::Display)),
        "pandas" => Ok(Value::Module(Handle::Pandas)),
        other => Err(format!("No module named '{}'", other)),
    }
}

fn resolve_member(module: &str, name: &str) -> Exec<Value> {
    match (module, name) {
        ("matplotlib", "pyplot") => Ok(Value::Module(Handle::Pyplot)),
        _ => Err(format!("cannot import name '{}' from '{}'", name, module)),
    }
}

fn iter_values(v: Value) -> Exec<Vec<Value>> {
    match v {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        Value::Series(s) => Ok(s.values.iter().map(Value::from_datum).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Frame(f) => Ok(f.column_names().into_iter().map(Value::Str).collect()),
        other => Err(format!("'{}' object is not iterable", other.type_name())),
    }
}

fn attribute(v: &Value, attr: &str) -> Exec<Value> {
    match (v, attr) {
        (Value::Frame(f), "columns") => {
            Ok(Value::List(f.column_names().into_iter().map(Value::Str).collect()))
        }
        (Value::Frame(f), "shape") => Ok(Value::Tuple(vec![
            Value::Int(f.n_rows() as i64),
            Value::Int(f.n_cols() as i64),
        ])),
        (Value::Series(s), "name") => Ok(Value::Str(s.name.clone())),
        _ => Err(format!(
            "'{}' object has no attribute '{}'",
            v.type_name(),
            attr
        )),
    }
}

fn subscript(v: Value, index: Value) -> Exec<Value> {
    match (v, index) {
        (Value::Frame(f), Value::Str(name)) => match f.column(&name) {
            Some(c) => Ok(Value::Series(Series::from_column(&name, c.values.clone()))),
            Option::None => Err(format!("unknown column '{}'", name)),
        },
        (Value::Frame(f), Value::Series(mask)) => {
            let bools: Exec<Vec<bool>> = mask
                .values
                .iter()
                .map(|d| match d {
                    Datum::Bool(b) => Ok(*b),
                    Datum::Null => Ok(false),
                    other => Err(format!(
                        "frame masks must be boolean, found {}",
                        other.type_name()
                    )),
                })
                .collect();
            Ok(Value::Frame(f.filter(&bools?)?))
        }
        (Value::GroupBy(g), Value::Str(name)) => {
            if !g.frame.has_column(&name) {
                return Err(format!("unknown column '{}'", name));
            }
            Ok(Value::GroupedSeries(GroupedSeries {
                frame: g.frame,
                key: g.key,
                column: name,
            }))
        }
        (Value::Series(s), key) => {
            let datum = key.to_datum()?;
            match s.lookup(&datum) {
                Some(d) => Ok(Value::from_datum(d)),
                Option::None => Err(format!("key '{}' not found in series '{}'", datum, s.name)),
            }
        }
        (Value::List(items), Value::Int(i)) | (Value::Tuple(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let idx = if i < 0 { i + len } else { i };
            if idx < 0 || idx >= len {
                return Err("sequence index out of range".into());
            }
            Ok(items[idx as usize].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let idx = if i < 0 { i + len } else { i };
            if idx < 0 || idx >= len {
                return Err("string index out of range".into());
            }
            Ok(Value::Str(chars[idx as usize].to_string()))
        }
        (v, i) => Err(format!(
            "'{}' object is not subscriptable with {}",
            v.type_name(),
            i.type_name()
        )),
    }
}

fn column_cells(v: Value, rows: usize) -> Exec<Vec<Datum>> {
    match v {
        Value::Series(s) => {
            if s.len() != rows {
                return Err(format!(
                    "cannot assign a series of length {} to a frame of {} rows",
                    s.len(),
                    rows
                ));
            }
            Ok(s.values)
        }
        Value::List(items) => {
            if items.len() != rows {
                return Err(format!(
                    "cannot assign {} values to a frame of {} rows",
                    items.len(),
                    rows
                ));
            }
            items.iter().map(Value::to_datum).collect()
        }
        scalar => {
            let d = scalar.to_datum()?;
            Ok(vec![d; rows])
        }
    }
}

fn frame_method(
    f: &Frame,
    attr: &str,
    argv: Vec<Value>,
    kwv: Vec<(String, Value)>,
) -> Exec<Value> {
    if let Some(op) = AggOp::from_name(attr) {
        let mut index = Vec::new();
        let mut values = Vec::new();
        for c in f.columns() {
            let numeric = matches!(c.dtype(), "int" | "float");
            if numeric || op == AggOp::Count {
                index.push(Datum::Str(c.name.clone()));
                values.push(aggregate(&c.values, op, &c.name)?);
            }
        }
        return Ok(Value::Series(Series {
            name: op.name().to_string(),
            index,
            values,
        }));
    }
    match attr {
        "head" => {
            let n = match (argv.first(), kw_get(&kwv, "n")) {
                (Some(Value::Int(n)), _) | (Option::None, Some(Value::Int(n))) => *n.max(&0) as usize,
                (Option::None, Option::None) => 5,
                _ => return Err("head() takes an integer row count".into()),
            };
            Ok(Value::Frame(f.head(n)))
        }
        "groupby" => {
            let key = match (argv.into_iter().next(), kw_get(&kwv, "by")) {
                (Some(Value::Str(s)), _) => s,
                (Option::None, Some(Value::Str(s))) => s.clone(),
                _ => return Err("groupby() takes a column name".into()),
            };
            if !f.has_column(&key) {
                return Err(format!("unknown column '{}'", key));
            }
            Ok(Value::GroupBy(GroupBy {
                frame: f.clone(),
                key,
            }))
        }
        other => Err(format!("'DataFrame' object has no method '{}'", other)),
    }
}

fn series_method(s: &Series, attr: &str, argv: Vec<Value>) -> Exec<Value> {
    if let Some(op) = AggOp::from_name(attr) {
        return Ok(Value::from_datum(&aggregate(&s.values, op, &s.name)?));
    }
    match attr {
        "value_counts" => {
            let mut keys: Vec<Datum> = Vec::new();
            let mut counts: Vec<i64> = Vec::new();
            for d in &s.values {
                if d.is_null() {
                    continue;
                }
                match keys.iter().position(|k| k.loose_eq(d)) {
                    Some(i) => counts[i] += 1,
                    Option::None => {
                        keys.push(d.clone());
                        counts.push(1);
                    }
                }
            }
            let mut order: Vec<usize> = (0..keys.len()).collect();
            order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(keys[a].compare(&keys[b])));
            Ok(Value::Series(Series {
                name: s.name.clone(),
                index: order.iter().map(|&i| keys[i].clone()).collect(),
                values: order.iter().map(|&i| Datum::Int(counts[i])).collect(),
            }))
        }
        "unique" => {
            let mut keys: Vec<Datum> = Vec::new();
            for d in &s.values {
                if !d.is_null() && !keys.iter().any(|k| k.loose_eq(d)) {
                    keys.push(d.clone());
                }
            }
            Ok(Value::List(keys.iter().map(Value::from_datum).collect()))
        }
        "round" => {
            let digits = match argv.first() {
                Some(Value::Int(d)) => *d,
                Option::None => 0,
                _ => return Err("round() digits must be an integer".into()),
            };
            let factor = 10f64.powi(digits as i32);
            let values = s
                .values
                .iter()
                .map(|d| match d.as_f64() {
                    Some(v) => Datum::Float((v * factor).round() / factor),
                    Option::None => d.clone(),
                })
                .collect();
            Ok(Value::Series(Series {
                name: s.name.clone(),
                index: s.index.clone(),
                values,
            }))
        }
        other => Err(format!("'Series' object has no method '{}'", other)),
    }
}

fn groupby_method(g: &GroupBy, attr: &str) -> Exec<Value> {
    let Some(op) = AggOp::from_name(attr) else {
        return Err(format!("'GroupBy' object has no method '{}'", attr));
    };
    let keys = group_keys(&g.frame, &g.key)?;
    let mut columns = vec![crate::dataset::Column {
        name: g.key.clone(),
        values: keys.clone(),
    }];
    for c in g.frame.columns() {
        if c.name == g.key {
            continue;
        }
        let include = match op {
            AggOp::Mean | AggOp::Sum => matches!(c.dtype(), "int" | "float"),
            _ => true,
        };
        if !include {
            continue;
        }
        let series = aggregate_grouped(&g.frame, &g.key, &c.name, op)?;
        columns.push(crate::dataset::Column {
            name: c.name.clone(),
            values: series.values,
        });
    }
    Ok(Value::Frame(Frame::new(columns)?))
}

fn grouped_method(g: &GroupedSeries, attr: &str) -> Exec<Value> {
    let Some(op) = AggOp::from_name(attr) else {
        return Err(format!("'GroupBy' object has no method '{}'", attr));
    };
    Ok(Value::Series(aggregate_grouped(
        &g.frame, &g.key, &g.column, op,
    )?))
}

fn unary(op: UnaryOp, v: Value) -> Exec<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.truthy()?)),
        UnaryOp::Neg => match v {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            Value::Series(s) => {
                let values = s
                    .values
                    .iter()
                    .map(|d| match d {
                        Datum::Int(n) => Ok(Datum::Int(-n)),
                        Datum::Float(n) => Ok(Datum::Float(-n)),
                        Datum::Null => Ok(Datum::Null),
                        other => Err(format!("cannot negate a {} cell", other.type_name())),
                    })
                    .collect::<Exec<_>>()?;
                Ok(Value::Series(Series {
                    name: s.name,
                    index: s.index,
                    values,
                }))
            }
            other => Err(format!("bad operand type for unary -: '{}'", other.type_name())),
        },
    }
}

fn binary(l: Value, op: BinOp, r: Value) -> Exec<Value> {
    // element-wise when a series is involved
    if matches!(l, Value::Series(_)) || matches!(r, Value::Series(_)) {
        return series_binary(l, op, r);
    }
    match (&l, &r) {
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if op == BinOp::Mul => {
            Ok(Value::Str(s.repeat((*n).max(0) as usize)))
        }
        (Value::List(a), Value::List(b)) if op == BinOp::Add => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        (Value::Int(a), Value::Int(b)) if int_preserving(op) => int_binary(*a, op, *b),
        _ => {
            let (a, b) = match (l.as_number(), r.as_number()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(format!(
                        "unsupported operand type(s) for {}: '{}' and '{}'",
                        op.symbol(),
                        l.type_name(),
                        r.type_name()
                    ))
                }
            };
            Ok(Value::Float(float_binary(a, op, b)?))
        }
    }
}

fn int_preserving(op: BinOp) -> bool {
    matches!(
        op,
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::FloorDiv | BinOp::Mod
    )
}

fn int_binary(a: i64, op: BinOp, b: i64) -> Exec<Value> {
    let checked = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::FloorDiv => {
            if b == 0 {
                return Err("integer division or modulo by zero".into());
            }
            Some((a as f64 / b as f64).floor() as i64)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err("integer division or modulo by zero".into());
            }
            Some(((a % b) + b) % b)
        }
        BinOp::Div => Option::None,
    };
    match checked {
        Some(v) => Ok(Value::Int(v)),
        Option::None => Ok(Value::Float(float_binary(a as f64, op, b as f64)?)),
    }
}

fn float_binary(a: f64, op: BinOp, b: f64) -> Exec<f64> {
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div => {
            if b == 0.0 {
                Err("division by zero".into())
            } else {
                Ok(a / b)
            }
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                Err("division by zero".into())
            } else {
                Ok((a / b).floor())
            }
        }
        BinOp::Mod => {
            if b == 0.0 {
                Err("division by zero".into())
            } else {
                Ok(a - b * (a / b).floor())
            }
        }
    }
}

fn series_binary(l: Value, op: BinOp, r: Value) -> Exec<Value> {
    fn cell(a: &Datum, op: BinOp, b: &Datum) -> Exec<Datum> {
        if a.is_null() || b.is_null() {
            return Ok(Datum::Null);
        }
        match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => {
                let keep_int = matches!(a, Datum::Int(_))
                    && matches!(b, Datum::Int(_))
                    && int_preserving(op);
                let v = float_binary(x, op, y)?;
                if keep_int {
                    Ok(Datum::Int(v as i64))
                } else {
                    Ok(Datum::Float(v))
                }
            }
            _ => match (a, b) {
                (Datum::Str(x), Datum::Str(y)) if op == BinOp::Add => {
                    Ok(Datum::Str(format!("{}{}", x, y)))
                }
                _ => Err(format!(
                    "unsupported operand type(s) for {}: '{}' and '{}'",
                    op.symbol(),
                    a.type_name(),
                    b.type_name()
                )),
            },
        }
    }

    match (l, r) {
        (Value::Series(a), Value::Series(b)) => {
            if a.len() != b.len() {
                return Err(format!(
                    "cannot combine series of lengths {} and {}",
                    a.len(),
                    b.len()
                ));
            }
            let values = a
                .values
                .iter()
                .zip(&b.values)
                .map(|(x, y)| cell(x, op, y))
                .collect::<Exec<_>>()?;
            Ok(Value::Series(Series {
                name: a.name,
                index: a.index,
                values,
            }))
        }
        (Value::Series(a), scalar) => {
            let d = scalar.to_datum()?;
            let values = a
                .values
                .iter()
                .map(|x| cell(x, op, &d))
                .collect::<Exec<_>>()?;
            Ok(Value::Series(Series {
                name: a.name,
                index: a.index,
                values,
            }))
        }
        (scalar, Value::Series(b)) => {
            let d = scalar.to_datum()?;
            let values = b
                .values
                .iter()
                .map(|x| cell(&d, op, x))
                .collect::<Exec<_>>()?;
            Ok(Value::Series(Series {
                name: b.name,
                index: b.index,
                values,
            }))
        }
        _ => Err("internal: series_binary without a series".into()),
    }
}

fn compare(l: Value, op: CmpOp, r: Value) -> Exec<Value> {
    if op == CmpOp::In {
        return contains(&l, &r).map(Value::Bool);
    }
    if matches!(l, Value::Series(_)) || matches!(r, Value::Series(_)) {
        return series_compare(l, op, r);
    }
    match op {
        CmpOp::Eq => Ok(Value::Bool(l.loose_eq(&r))),
        CmpOp::Ne => Ok(Value::Bool(!l.loose_eq(&r))),
        _ => match l.compare(&r) {
            Some(ord) => Ok(Value::Bool(match op {
                CmpOp::Lt => ord.is_lt(),
                CmpOp::Le => ord.is_le(),
                CmpOp::Gt => ord.is_gt(),
                CmpOp::Ge => ord.is_ge(),
                _ => false,
            })),
            Option::None => Err(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.symbol(),
                l.type_name(),
                r.type_name()
            )),
        },
    }
}

fn series_compare(l: Value, op: CmpOp, r: Value) -> Exec<Value> {
    fn cell(a: &Datum, op: CmpOp, b: &Datum) -> Exec<Datum> {
        if a.is_null() || b.is_null() {
            return Ok(Datum::Bool(op == CmpOp::Ne));
        }
        let result = match op {
            CmpOp::Eq => a.loose_eq(b),
            CmpOp::Ne => !a.loose_eq(b),
            _ => {
                let comparable = matches!(
                    (a, b),
                    (Datum::Str(_), Datum::Str(_))
                        | (Datum::Int(_) | Datum::Float(_), Datum::Int(_) | Datum::Float(_))
                );
                if !comparable {
                    return Err(format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        op.symbol(),
                        a.type_name(),
                        b.type_name()
                    ));
                }
                let ord = a.compare(b);
                match op {
                    CmpOp::Lt => ord.is_lt(),
                    CmpOp::Le => ord.is_le(),
                    CmpOp::Gt => ord.is_gt(),
                    CmpOp::Ge => ord.is_ge(),
                    _ => false,
                }
            }
        };
        Ok(Datum::Bool(result))
    }

    match (l, r) {
        (Value::Series(a), Value::Series(b)) => {
            if a.len() != b.len() {
                return Err(format!(
                    "cannot compare series of lengths {} and {}",
                    a.len(),
                    b.len()
                ));
            }
            let values = a
                .values
                .iter()
                .zip(&b.values)
                .map(|(x, y)| cell(x, op, y))
                .collect::<Exec<_>>()?;
            Ok(Value::Series(Series {
                name: a.name,
                index: a.index,
                values,
            }))
        }
        (Value::Series(a), scalar) => {
            let d = scalar.to_datum()?;
            let values = a
                .values
                .iter()
                .map(|x| cell(x, op, &d))
                .collect::<Exec<_>>()?;
            Ok(Value::Series(Series {
                name: a.name,
                index: a.index,
                values,
            }))
        }
        (scalar, Value::Series(b)) => {
            let d = scalar.to_datum()?;
            let values = b
                .values
                .iter()
                .map(|x| cell(&d, op, x))
                .collect::<Exec<_>>()?;
            Ok(Value::Series(Series {
                name: b.name,
                index: b.index,
                values,
            }))
        }
        _ => Err("internal: series_compare without a series".into()),
    }
}

fn contains(needle: &Value, haystack: &Value) -> Exec<bool> {
    match haystack {
        Value::List(items) | Value::Tuple(items) => {
            Ok(items.iter().any(|i| i.loose_eq(needle)))
        }
        Value::Str(s) => match needle {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            other => Err(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            )),
        },
        Value::Frame(f) => match needle {
            Value::Str(name) => Ok(f.has_column(name)),
            _ => Ok(false),
        },
        Value::Series(s) => {
            let d = needle.to_datum()?;
            Ok(s.values.iter().any(|v| v.loose_eq(&d)))
        }
        other => Err(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse;
    use crate::dataset::Column;
    use crate::render::RecordingSink;

    fn frame() -> Frame {
        Frame::new(vec![
            Column {
                name: "gender".into(),
                values: vec![
                    Datum::Str("Female".into()),
                    Datum::Str("Male".into()),
                    Datum::Str("Female".into()),
                    Datum::Str("Male".into()),
                ],
            },
            Column {
                name: "purchase_amount".into(),
                values: vec![
                    Datum::Float(120.0),
                    Datum::Float(80.0),
                    Datum::Float(100.0),
                    Datum::Float(60.0),
                ],
            },
            Column {
                name: "category".into(),
                values: vec![
                    Datum::Str("Books".into()),
                    Datum::Str("Games".into()),
                    Datum::Str("Books".into()),
                    Datum::Str("Games".into()),
                ],
            },
        ])
        .unwrap()
    }

    fn run(src: &str) -> Result<String, String> {
        let mut sink = RecordingSink::default();
        run_with_sink(src, &mut sink)
    }

    fn run_with_sink(src: &str, sink: &mut RecordingSink) -> Result<String, String> {
        let program = parse(src).unwrap();
        Interpreter::new(frame(), sink).run(&program)
    }

    #[test]
    fn captures_output_in_order() {
        let out = run("print('A')\nprint('B')\n").unwrap();
        assert_eq!(out, "A\nB\n");
    }

    #[test]
    fn empty_output_is_allowed() {
        assert_eq!(run("x = 1\n").unwrap(), "");
    }

    #[test]
    fn grouped_mean_end_to_end() {
        let src = "avg = df.groupby('gender')['purchase_amount'].mean()\n\
                   print(\"Female:\", avg['Female'])\n\
                   print(\"Male:\", avg['Male'])\n";
        let out = run(src).unwrap();
        assert_eq!(out, "Female: 110.0\nMale: 70.0\n");
    }

    #[test]
    fn execution_is_idempotent() {
        let src = "print(df['purchase_amount'].sum())\n";
        assert_eq!(run(src).unwrap(), run(src).unwrap());
    }

    #[test]
    fn unknown_names_are_errors_not_noops() {
        let err = run("print(undefined_thing)\n").unwrap_err();
        assert_eq!(err, "name 'undefined_thing' is not defined");
        // host-side identifiers are equally unreachable
        let err = run("open('x')\n").unwrap_err();
        assert!(err.contains("not defined"));
    }

    #[test]
    fn missing_column_is_reported() {
        let err = run("print(df['salary'])\n").unwrap_err();
        assert!(err.contains("unknown column 'salary'"));
    }

    #[test]
    fn partial_output_is_discarded_on_failure() {
        let err = run("print('early')\nprint(df['salary'])\n").unwrap_err();
        assert!(err.contains("salary"));
    }

    #[test]
    fn mask_filtering_and_shape() {
        let src = "big = df[df['purchase_amount'] > 90]\nprint(big.shape)\n";
        assert_eq!(run(src).unwrap(), "(2, 3)\n");
    }

    #[test]
    fn for_and_if_drive_printing() {
        let src = "for c in df.columns:\n    if c == 'gender':\n        print(c)\n";
        assert_eq!(run(src).unwrap(), "gender\n");
    }

    #[test]
    fn column_mutation_is_local_to_the_run() {
        let src = "df['flag'] = 1\nprint(df.shape)\n";
        // visible within the run...
        assert_eq!(run(src).unwrap(), "(4, 4)\n");
        // ...but the next run starts from the pristine frame
        assert_eq!(run("print(df.shape)\n").unwrap(), "(4, 3)\n");
    }

    #[test]
    fn barplot_registers_aggregated_figure() {
        let src = "plt.figure(figsize=(8, 6))\n\
                   sns.barplot(x='category', y='purchase_amount', data=df)\n\
                   plt.title('Purchase Amount by Category')\n\
                   plt.xlabel('Category')\n\
                   plt.ylabel('Purchase Amount')\n\
                   st.pyplot(plt)\n\
                   plt.clf()\n";
        let mut sink = RecordingSink::default();
        let out = run_with_sink(src, &mut sink).unwrap();
        assert_eq!(out, "");
        assert_eq!(sink.figures.len(), 1);
        let fig = &sink.figures[0];
        assert_eq!(fig.kind, ChartKind::Bar);
        assert_eq!(fig.title.as_deref(), Some("Purchase Amount by Category"));
        assert_eq!(fig.xlabel.as_deref(), Some("Category"));
        assert_eq!(
            fig.points,
            vec![("Books".to_string(), 110.0), ("Games".to_string(), 70.0)]
        );
    }

    #[test]
    fn runtime_import_binds_handles_only() {
        let src = "import matplotlib.pyplot as p\np.title('t')\nst.pyplot(p)\n";
        let mut sink = RecordingSink::default();
        run_with_sink(src, &mut sink).unwrap();
        assert_eq!(sink.figures[0].title.as_deref(), Some("t"));
        let err = run("import requests\n").unwrap_err();
        assert_eq!(err, "No module named 'requests'");
    }

    #[test]
    fn st_write_goes_to_the_sink_not_stdout() {
        let mut sink = RecordingSink::default();
        let out = run_with_sink("st.write('hello', 2)\n", &mut sink).unwrap();
        assert_eq!(out, "");
        assert_eq!(sink.texts, vec!["hello 2"]);
    }

    #[test]
    fn division_by_zero_is_an_execution_error() {
        assert!(run("print(1 / 0)\n").unwrap_err().contains("zero"));
        assert!(run("print(1 // 0)\n").unwrap_err().contains("zero"));
    }

    #[test]
    fn value_counts_orders_by_frequency() {
        let out = run("print(df['category'].value_counts())\n").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Books"));
        assert!(lines[0].ends_with('2'));
    }

    #[test]
    fn arithmetic_matches_python_semantics() {
        assert_eq!(run("print(3 / 2)\n").unwrap(), "1.5\n");
        assert_eq!(run("print(7 // 2)\n").unwrap(), "3\n");
        assert_eq!(run("print(-7 // 2)\n").unwrap(), "-4\n");
        assert_eq!(run("print(-7 % 3)\n").unwrap(), "2\n");
        assert_eq!(run("print('ab' + 'cd')\n").unwrap(), "abcd\n");
    }

    #[test]
    fn builtins_cover_len_range_round_sum() {
        assert_eq!(run("print(len(df))\n").unwrap(), "4\n");
        assert_eq!(run("print(len('héllo'))\n").unwrap(), "5\n");
        assert_eq!(run("print(range(3))\n").unwrap(), "[0, 1, 2]\n");
        assert_eq!(run("print(round(2.567, 2))\n").unwrap(), "2.57\n");
        assert_eq!(run("print(sum([1, 2, 3]))\n").unwrap(), "6\n");
        assert_eq!(run("print(sum(df['purchase_amount']))\n").unwrap(), "360.0\n");
    }

    #[test]
    fn truthiness_of_frame_is_rejected() {
        let err = run("if df:\n    print('x')\n").unwrap_err();
        assert!(err.contains("ambiguous"));
    }
}
