use crate::{
    config::{LowerOptions, OptionPolicy},
    language::{
        ast::*,
        errors::LowerErrorKind,
        span::Span,
        types::TypeExpr,
    },
    lower::{ImportSet, NameGen},
    tests::support::*,
};

fn result_of(ty: TypeExpr) -> Option<TypeExpr> {
    Some(TypeExpr::result(ty))
}

fn valid() -> Item {
    func("Valid", Vec::new(), result_of(named("bool")), vec![Statement::ret(vec![Expr::bool(true)])])
}

fn load() -> Item {
    func("Load", Vec::new(), result_of(named("int")), vec![Statement::ret(vec![Expr::int(1)])])
}

fn body_of(output: &str, signature: &str) -> String {
    let start = output
        .find(signature)
        .unwrap_or_else(|| panic!("`{signature}` missing from:\n{output}"));
    let rest = &output[start..];
    let end = rest.find("\n}\n").map_or(rest.len(), |end| end + 3);
    rest[..end].to_string()
}

#[test]
fn hidden_names_skip_names_already_in_use() {
    let mut names = NameGen::new("gx", ["gxErr0".to_string(), "gxVal1".to_string()]);
    assert_eq!(names.fresh("Err"), "gxErr1");
    assert_eq!(names.fresh("Val"), "gxVal0");
    assert_eq!(names.fresh("Val"), "gxVal2");
    assert_eq!(names.fresh("Err"), "gxErr2");
}

#[test]
fn required_imports_are_deduplicated_and_sorted() {
    let mut program = unit(Vec::new());
    program.imports.push(Import::new("os"));
    program.imports.push(Import::new("fmt"));
    let mut imports = ImportSet::default();
    imports.require_for("fmt.Sprintf");
    imports.require_for("errors.New");
    imports.require("sync");
    imports.require_for("unqualified");
    imports.apply(&mut program);
    let paths: Vec<&str> = program.imports.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, vec!["errors", "fmt", "os", "sync"]);
}

#[test]
fn impure_siblings_are_spilled_before_a_hoisted_try() {
    let next = func("next", Vec::new(), Some(named("int")), vec![Statement::ret(vec![Expr::int(2)])]);
    let sum = func(
        "Sum",
        Vec::new(),
        result_of(named("int")),
        vec![Statement::ret(vec![Expr::binary(
            BinaryOp::Add,
            call("next", Vec::new()),
            try_call("Load", Vec::new()),
        )])],
    );
    let output = emit(unit(vec![load(), next, sum]));
    assert_eq!(
        body_of(&output, "func Sum"),
        "func Sum() (int, error) {
\tgxTmp0 := next()
\tgxVal0, gxErr0 := Load()
\tif gxErr0 != nil {
\t\treturn 0, gxErr0
\t}
\treturn gxTmp0 + gxVal0, nil
}
"
    );
}

#[test]
fn pure_siblings_stay_in_place() {
    let sum = func(
        "Sum",
        vec![("base", named("int"))],
        result_of(named("int")),
        vec![Statement::ret(vec![Expr::binary(
            BinaryOp::Add,
            Expr::ident("base"),
            try_call("Load", Vec::new()),
        )])],
    );
    let output = emit(unit(vec![load(), sum]));
    assert!(!output.contains("gxTmp"), "{output}");
    assert!(output.contains("\treturn base + gxVal0, nil\n"), "{output}");
}

#[test]
fn try_on_the_right_of_and_runs_behind_a_guard() {
    let check = func(
        "Check",
        vec![("ok", named("bool"))],
        result_of(named("bool")),
        vec![Statement::ret(vec![Expr::binary(
            BinaryOp::And,
            Expr::ident("ok"),
            try_call("Valid", Vec::new()),
        )])],
    );
    let output = emit(unit(vec![valid(), check]));
    assert_eq!(
        body_of(&output, "func Check"),
        "func Check(ok bool) (bool, error) {
\tgxCond0 := ok
\tif gxCond0 {
\t\tgxVal0, gxErr0 := Valid()
\t\tif gxErr0 != nil {
\t\t\treturn false, gxErr0
\t\t}
\t\tgxCond0 = gxVal0
\t}
\treturn gxCond0, nil
}
"
    );
}

#[test]
fn try_on_the_right_of_or_runs_when_the_left_is_false() {
    let check = func(
        "Check",
        vec![("ok", named("bool"))],
        result_of(named("bool")),
        vec![Statement::ret(vec![Expr::binary(
            BinaryOp::Or,
            Expr::ident("ok"),
            try_call("Valid", Vec::new()),
        )])],
    );
    let output = emit(unit(vec![valid(), check]));
    assert!(output.contains("\tif !gxCond0 {\n"), "{output}");
}

#[test]
fn multi_value_try_destructures_into_targets() {
    let pair = func(
        "Pair",
        Vec::new(),
        result_of(TypeExpr::Tuple(vec![named("int"), named("string")])),
        vec![Statement::ret(vec![Expr::int(1), Expr::string("a")])],
    );
    let run = func(
        "Run",
        Vec::new(),
        result_of(TypeExpr::unit()),
        vec![
            Statement::define(&["n", "s"], vec![try_call("Pair", Vec::new())]),
            Statement::expr(call("use", vec![Expr::ident("n"), Expr::ident("s")])),
            Statement::ret(Vec::new()),
        ],
    );
    let output = emit(unit(vec![pair, run]));
    assert!(output.contains("func Pair() (int, string, error) {\n\treturn 1, \"a\", nil\n}"));
    assert_eq!(
        body_of(&output, "func Run"),
        "func Run() error {
\tgxVal0, gxVal1, gxErr0 := Pair()
\tif gxErr0 != nil {
\t\treturn gxErr0
\t}
\tn, s := gxVal0, gxVal1
\tuse(n, s)
\treturn nil
}
"
    );
}

#[test]
fn try_statement_discards_values() {
    let run = func(
        "Run",
        Vec::new(),
        result_of(TypeExpr::unit()),
        vec![Statement::expr(try_call("Load", Vec::new())), Statement::ret(Vec::new())],
    );
    let output = emit(unit(vec![load(), run]));
    assert!(output.contains("\t_, gxErr0 := Load()\n"), "{output}");
}

#[test]
fn result_returns_follow_the_lowered_shape() {
    let forward = func(
        "Forward",
        Vec::new(),
        result_of(named("int")),
        vec![Statement::ret(vec![call("Load", Vec::new())])],
    );
    let explicit = func(
        "Explicit",
        vec![("err", named("error"))],
        result_of(named("int")),
        vec![Statement::ret(vec![Expr::int(0), Expr::ident("err")])],
    );
    let tried = func(
        "Tried",
        Vec::new(),
        result_of(named("int")),
        vec![Statement::ret(vec![try_call("Load", Vec::new())])],
    );
    let output = emit(unit(vec![load(), forward, explicit, tried]));
    assert!(output.contains("\treturn Load()\n"), "{output}");
    assert!(output.contains("\treturn 0, err\n"), "{output}");
    assert!(output.contains("\treturn gxVal0, nil\n"), "{output}");
}

#[test]
fn throw_operands_become_error_values() {
    let check = func(
        "Check",
        vec![("id", named("int")), ("cause", named("error"))],
        result_of(TypeExpr::unit()),
        vec![
            Statement::if_then(
                Expr::binary(BinaryOp::Lt, Expr::ident("id"), Expr::int(0)),
                vec![Statement::throw(interpolated(vec![
                    text("bad id "),
                    embed(Expr::ident("id"), None),
                ]))],
            ),
            Statement::if_then(
                Expr::binary(BinaryOp::NotEq, Expr::ident("cause"), Expr::nil()),
                vec![Statement::throw(Expr::ident("cause"))],
            ),
            Statement::ret(Vec::new()),
        ],
    );
    let output = emit(unit(vec![check]));
    assert!(output.contains("import \"fmt\"\n"), "{output}");
    assert!(output.contains("\t\treturn fmt.Errorf(\"bad id %v\", id)\n"), "{output}");
    assert!(output.contains("\t\treturn cause\n"), "{output}");
}

#[test]
fn thrown_errors_can_wrap_a_cause() {
    let open = func(
        "Open",
        vec![("cause", named("error"))],
        result_of(TypeExpr::unit()),
        vec![Statement::throw(interpolated(vec![
            text("load: "),
            embed(Expr::ident("cause"), Some("w")),
        ]))],
    );
    let output = emit(unit(vec![open]));
    assert!(output.contains("\treturn fmt.Errorf(\"load: %w\", cause)\n"), "{output}");
}

fn quoted_name() -> Expr {
    interpolated(vec![
        text("<"),
        embed(Expr::ident("name"), Some("q")),
        text(">"),
    ])
}

#[test]
fn nested_interpolations_expand_innermost_first() {
    let main = func(
        "main",
        vec![("name", named("string")), ("n", named("int"))],
        None,
        vec![Statement::define(
            &["s"],
            vec![interpolated(vec![
                embed(quoted_name(), Some("s")),
                text(" x"),
                embed(Expr::ident("n"), None),
            ])],
        )],
    );
    let output = emit(unit(vec![main]));
    assert!(
        output.contains("\ts := fmt.Sprintf(\"%s x%v\", fmt.Sprintf(\"<%q>\", name), n)\n"),
        "{output}"
    );
}

#[test]
fn nested_interpolation_inside_a_thrown_error() {
    let check = func(
        "Check",
        vec![("name", named("string"))],
        result_of(TypeExpr::unit()),
        vec![Statement::throw(interpolated(vec![
            text("bad "),
            embed(quoted_name(), None),
        ]))],
    );
    let output = emit(unit(vec![check]));
    assert_eq!(output.matches("\"fmt\"").count(), 1, "{output}");
    assert!(
        output.contains("\treturn fmt.Errorf(\"bad %v\", fmt.Sprintf(\"<%q>\", name))\n"),
        "{output}"
    );
}

#[test]
fn struct_zero_values_in_early_returns() {
    let user = Item::Struct(StructDef {
        name: "User".into(),
        fields: Vec::new(),
        span: Span::default(),
    });
    let find = func(
        "Find",
        Vec::new(),
        result_of(TypeExpr::Tuple(vec![named("User"), named("Status")])),
        vec![Statement::throw(Expr::string("missing"))],
    );
    let output = emit(unit(vec![user, find]));
    assert!(
        output.contains("\treturn User{}, *new(Status), errors.New(\"missing\")\n"),
        "{output}"
    );
}

#[test]
fn hoisting_out_of_else_if_stays_inside_the_else() {
    let run = func(
        "Run",
        vec![("a", named("bool"))],
        result_of(TypeExpr::unit()),
        vec![
            Statement::If(IfStmt {
                condition: Expr::ident("a"),
                then_branch: Block::new(vec![Statement::ret(Vec::new())]),
                else_branch: Some(ElseBranch::ElseIf(Box::new(IfStmt {
                    condition: try_call("Valid", Vec::new()),
                    then_branch: Block::new(vec![Statement::ret(Vec::new())]),
                    else_branch: None,
                    span: Span::default(),
                }))),
                span: Span::default(),
            }),
            Statement::ret(Vec::new()),
        ],
    );
    let output = emit(unit(vec![valid(), run]));
    assert_eq!(
        body_of(&output, "func Run"),
        "func Run(a bool) error {
\tif a {
\t\treturn nil
\t} else {
\t\tgxVal0, gxErr0 := Valid()
\t\tif gxErr0 != nil {
\t\t\treturn gxErr0
\t\t}
\t\tif gxVal0 {
\t\t\treturn nil
\t\t}
\t}
\treturn nil
}
"
    );
}

#[test]
fn try_in_a_loop_init_is_hoisted_into_a_scoping_block() {
    let run = func(
        "Run",
        Vec::new(),
        result_of(TypeExpr::unit()),
        vec![
            Statement::For(ForStmt {
                clause: ForClause::ThreeClause {
                    init: Some(Box::new(Statement::define(
                        &["i"],
                        vec![try_call("Load", Vec::new())],
                    ))),
                    condition: Some(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3))),
                    post: Some(Box::new(Statement::Assign(AssignStmt {
                        targets: vec![Expr::ident("i")],
                        op: AssignOp::Compound(BinaryOp::Add),
                        values: vec![Expr::int(1)],
                        span: Span::default(),
                    }))),
                },
                body: Block::default(),
                span: Span::default(),
            }),
            Statement::ret(Vec::new()),
        ],
    );
    let output = emit(unit(vec![load(), run]));
    assert_eq!(
        body_of(&output, "func Run"),
        "func Run() error {
\t{
\t\tgxVal0, gxErr0 := Load()
\t\tif gxErr0 != nil {
\t\t\treturn gxErr0
\t\t}
\t\tfor i := gxVal0; i < 3; i += 1 {
\t\t}
\t}
\treturn nil
}
"
    );
}

#[test]
fn try_in_a_loop_condition_is_unsupported() {
    let run = func(
        "Run",
        Vec::new(),
        result_of(TypeExpr::unit()),
        vec![
            Statement::For(ForStmt {
                clause: ForClause::Condition(try_call("Valid", Vec::new())),
                body: Block::default(),
                span: Span::default(),
            }),
            Statement::ret(Vec::new()),
        ],
    );
    assert_eq!(
        error_kinds(unit(vec![valid(), run])),
        vec![LowerErrorKind::UnsupportedConstruct]
    );
}

#[test]
fn propagation_errors_are_all_collected() {
    let hello_item = hello();
    let main = func(
        "main",
        Vec::new(),
        None,
        vec![
            Statement::define(&["greeting"], vec![call("Hello", vec![Expr::string("x")])]),
            Statement::expr(try_call("Hello", vec![Expr::string("y")])),
            Statement::Go(GoStmt {
                call: try_call("Hello", vec![Expr::string("z")]),
                span: Span::default(),
            }),
        ],
    );
    let wrong_arity = func(
        "Pick",
        Vec::new(),
        result_of(named("int")),
        vec![Statement::ret(vec![Expr::int(1), Expr::int(2), Expr::nil()])],
    );
    let unknown = func(
        "Fetch",
        Vec::new(),
        result_of(named("int")),
        vec![Statement::ret(vec![try_call("remote", Vec::new())])],
    );
    assert_eq!(
        error_kinds(unit(vec![hello_item, main, wrong_arity, unknown])),
        vec![
            LowerErrorKind::DiscardedResult,
            LowerErrorKind::ThrowWithoutResultType,
            LowerErrorKind::UnsupportedConstruct,
            LowerErrorKind::ArityMismatch,
            LowerErrorKind::InvalidTypeUsage,
        ]
    );
}

#[test]
fn function_literals_get_their_own_result_frame() {
    let run = func(
        "run",
        Vec::new(),
        None,
        vec![Statement::define(
            &["f"],
            vec![Expr::FuncLit(Box::new(FuncLit {
                params: Vec::new(),
                returns: result_of(named("int")),
                body: Block::new(vec![Statement::ret(vec![try_call("Load", Vec::new())])]),
                span: Span::default(),
            }))],
        )],
    );
    let output = emit(unit(vec![load(), run]));
    assert!(output.contains("\tf := func() (int, error) {\n"), "{output}");
    assert!(output.contains("\t\t\treturn 0, gxErr0\n"), "{output}");
    assert!(output.contains("\t\treturn gxVal0, nil\n\t}\n"), "{output}");
}

#[test]
fn option_types_follow_the_configured_policy() {
    let program = || {
        unit(vec![func(
            "pick",
            vec![
                ("count", TypeExpr::option(named("int"))),
                ("names", TypeExpr::option(TypeExpr::array(named("string")))),
            ],
            None,
            Vec::new(),
        )])
    };
    let output = emit(program());
    assert!(output.contains("func pick(count *int, names []string) {"), "{output}");

    let options = LowerOptions {
        option_policy: OptionPolicy::AlwaysPointer,
        ..LowerOptions::default()
    };
    let output = emit_with(program(), &options);
    assert!(output.contains("func pick(count *int, names *[]string) {"), "{output}");
}

#[test]
fn nil_producing_values_reach_non_nillable_slots() {
    let maybe = func(
        "maybe",
        Vec::new(),
        Some(TypeExpr::option(named("int"))),
        vec![Statement::ret(vec![Expr::nil()])],
    );
    let store = func(
        "store",
        vec![("p", TypeExpr::non_nillable(named("int")))],
        None,
        Vec::new(),
    );
    let strict = func(
        "strict",
        vec![("fallback", TypeExpr::non_nillable(named("int")))],
        Some(TypeExpr::non_nillable(named("int"))),
        vec![
            Statement::Var(VarStmt {
                names: vec![Identifier::new("p")],
                ty: Some(TypeExpr::non_nillable(named("int"))),
                values: Vec::new(),
                span: Span::default(),
            }),
            Statement::assign(vec![Expr::ident("fallback")], vec![call("maybe", Vec::new())]),
            Statement::expr(call("store", vec![Expr::nil()])),
            Statement::ret(vec![Expr::nil()]),
        ],
    );
    let kinds = error_kinds(unit(vec![maybe, store, strict]));
    assert_eq!(kinds, vec![LowerErrorKind::NilToNonNillable; 4]);

    let fine = func(
        "fine",
        vec![("fallback", TypeExpr::non_nillable(named("int")))],
        Some(TypeExpr::non_nillable(named("int"))),
        vec![Statement::ret(vec![Expr::ident("fallback")])],
    );
    let output = emit(unit(vec![fine]));
    assert!(output.contains("func fine(fallback *int) *int {"), "{output}");
}

#[test]
fn go_binding_captures_arguments_before_dispatch() {
    let compute = func(
        "compute",
        vec![("a", named("int")), ("b", named("string"))],
        Some(named("int")),
        vec![Statement::ret(vec![Expr::ident("a")])],
    );
    let main = func(
        "main",
        vec![("n", named("int"))],
        None,
        vec![
            Statement::go_binding(
                &["x"],
                call(
                    "compute",
                    vec![
                        Expr::binary(BinaryOp::Add, Expr::ident("n"), Expr::int(1)),
                        Expr::string("k"),
                    ],
                ),
            ),
            Statement::expr(call("println", vec![Expr::receive(Expr::ident("x"))])),
        ],
    );
    let output = emit(unit(vec![compute, main]));
    assert_eq!(
        body_of(&output, "func main"),
        "func main(n int) {
\tx := gxNewSync[int]()
\tgxArg0 := n + 1
\tgo func() {
\t\tdefer func() {
\t\t\tgxFail0 := recover()
\t\t\tif gxFail0 != nil {
\t\t\t\tx.fail(gxFail0)
\t\t\t}
\t\t}()
\t\tgxVal0 := compute(gxArg0, \"k\")
\t\tx.put(gxVal0)
\t}()
\tprintln(x.get())
}
"
    );
}

#[test]
fn method_go_binding_captures_the_method_value() {
    let store = empty_struct("Store");
    let rows = method(
        ("s", TypeExpr::pointer(named("Store"))),
        "Rows",
        vec![("id", named("int"))],
        result_of(TypeExpr::array(named("string"))),
        vec![Statement::ret(vec![Expr::nil()])],
    );
    let main = func(
        "main",
        vec![("store", TypeExpr::pointer(named("Store")))],
        None,
        vec![Statement::go_binding(
            &["rows", "err"],
            Expr::call(Expr::selector(Expr::ident("store"), "Rows"), vec![Expr::int(7)]),
        )],
    );
    let output = emit(unit(vec![store, rows, main]));
    assert!(output.contains("func (s *Store) Rows(id int) ([]string, error) {\n\treturn nil, nil\n}"));
    let body = body_of(&output, "func main");
    assert!(body.contains("\trows := gxNewSync[[]string]()\n\terr := gxNewSync[error]()\n"), "{body}");
    assert!(body.contains("\tgxArg0 := store.Rows\n"), "{body}");
    assert!(body.contains("\t\tgxVal0, gxVal1 := gxArg0(7)\n"), "{body}");
    assert!(body.contains("\t\t\t\trows.fail(gxFail0)\n\t\t\t\terr.fail(gxFail0)\n"), "{body}");
}

#[test]
fn blank_go_binding_only_runs_the_call() {
    let ping = func("ping", Vec::new(), Some(named("int")), vec![Statement::ret(vec![Expr::int(1)])]);
    let main = func(
        "main",
        Vec::new(),
        None,
        vec![Statement::go_binding(&["_"], call("ping", Vec::new()))],
    );
    let output = emit(unit(vec![ping, main]));
    assert_eq!(
        body_of(&output, "func main"),
        "func main() {\n\tgo func() {\n\t\tping()\n\t}()\n}\n"
    );
}

#[test]
fn redeclared_names_are_plain_channels_again() {
    let ping = func("ping", Vec::new(), Some(named("int")), vec![Statement::ret(vec![Expr::int(1)])]);
    let main = func(
        "main",
        Vec::new(),
        None,
        vec![
            Statement::go_binding(&["v"], call("ping", Vec::new())),
            Statement::Block(Block::new(vec![
                Statement::define(
                    &["v"],
                    vec![call(
                        "make",
                        vec![Expr::Type(
                            TypeExpr::channel(
                                named("int"),
                                crate::language::types::ChannelDirection::Bidirectional,
                            ),
                            Span::default(),
                        )],
                    )],
                ),
                Statement::expr(call("println", vec![Expr::receive(Expr::ident("v"))])),
            ])),
            Statement::expr(call("println", vec![Expr::receive(Expr::ident("v"))])),
        ],
    );
    let output = emit(unit(vec![ping, main]));
    assert!(output.contains("\t\tv := make(chan int)\n\t\tprintln(<-v)\n\t}\n"), "{output}");
    assert!(output.contains("\tprintln(v.get())\n}\n"), "{output}");
}

#[test]
fn go_binding_errors() {
    let ping = || func("ping", Vec::new(), Some(named("int")), vec![Statement::ret(vec![Expr::int(1)])]);
    let unknown = func(
        "main",
        Vec::new(),
        None,
        vec![Statement::go_binding(&["v"], call("remote", Vec::new()))],
    );
    assert_eq!(
        error_kinds(unit(vec![unknown])),
        vec![LowerErrorKind::UnsupportedConstruct]
    );

    let comma_ok = func(
        "main",
        Vec::new(),
        None,
        vec![
            Statement::go_binding(&["v"], call("ping", Vec::new())),
            Statement::define(&["x", "ok"], vec![Expr::receive(Expr::ident("v"))]),
        ],
    );
    assert_eq!(
        error_kinds(unit(vec![ping(), comma_ok])),
        vec![LowerErrorKind::UnsupportedConstruct]
    );

    let ranged = func(
        "main",
        Vec::new(),
        None,
        vec![
            Statement::go_binding(&["v"], call("ping", Vec::new())),
            Statement::For(ForStmt {
                clause: ForClause::Range {
                    key: Some(Identifier::new("x")),
                    value: None,
                    define: true,
                    iterable: Expr::ident("v"),
                },
                body: Block::default(),
                span: Span::default(),
            }),
        ],
    );
    assert_eq!(
        error_kinds(unit(vec![ping(), ranged])),
        vec![LowerErrorKind::UnsupportedConstruct]
    );
}

#[test]
fn custom_hidden_prefix_reaches_every_inserted_name() {
    let options = LowerOptions {
        hidden_prefix: "lw".into(),
        ..LowerOptions::default()
    };
    let greet = func(
        "Greet",
        Vec::new(),
        result_of(named("string")),
        vec![Statement::ret(vec![try_call("Hello", vec![Expr::string("a")])])],
    );
    let ping = func("ping", Vec::new(), Some(named("int")), vec![Statement::ret(vec![Expr::int(1)])]);
    let main = func(
        "main",
        Vec::new(),
        None,
        vec![Statement::go_binding(&["v"], call("ping", Vec::new()))],
    );
    let output = emit_with(unit(vec![hello(), greet, ping, main]), &options);
    assert!(output.contains("\tlwVal0, lwErr0 := Hello(\"a\")\n"), "{output}");
    assert!(output.contains("\tv := lwNewSync[int]()\n"), "{output}");
    assert!(output.contains("func lwNewSync[T any]() *lwSync[T] {"), "{output}");
    assert!(!output.contains("gx"), "{output}");
}

#[test]
fn interpolation_inside_function_literals_and_constants() {
    let greeting = Item::Const(ConstDef {
        name: "banner".into(),
        ty: None,
        value: interpolated(vec![text("v"), embed(Expr::ident("version"), None)]),
        span: Span::default(),
    });
    let run = func(
        "run",
        vec![("n", named("int"))],
        None,
        vec![Statement::define(
            &["f"],
            vec![Expr::FuncLit(Box::new(FuncLit {
                params: Vec::new(),
                returns: Some(named("string")),
                body: Block::new(vec![Statement::ret(vec![interpolated(vec![
                    embed(Expr::ident("n"), Some("05.1f")),
                    text("%"),
                ])])]),
                span: Span::default(),
            }))],
        )],
    );
    let output = emit(unit(vec![greeting, run]));
    assert!(output.contains("const banner = fmt.Sprintf(\"v%v\", version)\n"), "{output}");
    assert!(output.contains("\t\treturn fmt.Sprintf(\"%05.1f%%\", n)\n"), "{output}");
}
