#[macro_use]
extern crate pretty_assertions;

use vhdllint::lint::Linter;
use vhdllint::report::{Options, Report};

fn lint_named(filename: &str, source: &str) -> Vec<String> {
    lint_with(filename, source, Options::default())
}

fn lint_with(filename: &str, source: &str, options: Options) -> Vec<String> {
    let mut report = Report::new(options).unwrap();
    let mut linter = Linter::default();
    linter.process_source(filename, source, &mut report);
    report
        .pending()
        .iter()
        .map(|(_, text)| text.clone())
        .collect()
}

fn lint(source: &str) -> Vec<String> {
    lint_named("test_widget.vhd", source)
}

fn assert_has(diagnostics: &[String], needle: &str) {
    assert!(
        diagnostics.iter().any(|d| d.contains(needle)),
        "expected a diagnostic containing {:?}, got:\n{}",
        needle,
        diagnostics.join("")
    );
}

fn assert_lacks(diagnostics: &[String], needle: &str) {
    assert!(
        !diagnostics.iter().any(|d| d.contains(needle)),
        "expected no diagnostic containing {:?}, got:\n{}",
        needle,
        diagnostics.join("")
    );
}

const PREAMBLE: &str = "\
-- Copyright 2024 Example Co.
-- widget: example logic

library ieee;
use ieee.std_logic_1164.all;

";

fn widget(body: &str) -> String {
    format!(
        "{}entity widget is
  port (
    clk_i : in std_logic;
    d_i : in std_logic;
    q_o : out std_logic
  );
end entity widget;

architecture rtl of widget is

{}
end architecture rtl;
",
        PREAMBLE, body
    )
}

#[test]
fn clean_header_only_file_has_no_diagnostics() {
    let diagnostics = lint("-- Copyright 2024 Example Co.\n-- nothing to see here\n");
    assert_eq!(diagnostics, Vec::<String>::new());
}

#[test]
fn missing_final_newline_is_the_only_diagnostic_without_one() {
    let diagnostics = lint("-- Copyright 2024 Example Co.\n-- nothing to see here");
    assert_eq!(diagnostics.len(), 1);
    assert_has(&diagnostics, "Could not find a newline character at the end of the file.");
    assert_has(&diagnostics, "[whitespace/ending_newline] [5]");
}

#[test]
fn sensitivity_list_missing_read_signal() {
    let source = widget(
        "  signal a : std_logic;
  signal b : std_logic;
  signal y : std_logic;

begin

  p_comb : process(a)
  begin
    y <= a and b;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Missing signal 'b' from sensitivity list");
    assert_has(&diagnostics, "[runtime/sensitivity] [5]");
    // The diagnostic anchors on the assignment line.
    let line = diagnostics
        .iter()
        .find(|d| d.contains("Missing signal 'b'"))
        .unwrap();
    assert!(line.starts_with("test_widget.vhd:25:"), "got {:?}", line);
}

#[test]
fn extra_sensitivity_entry_is_flagged() {
    let source = widget(
        "  signal a : std_logic;
  signal b : std_logic;
  signal y : std_logic;

begin

  p_comb : process(a, b)
  begin
    y <= a;
    b <= a;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Extra signal 'b' in sensitivity list.");
    assert_has(&diagnostics, "[runtime/sensitivity] [4]");
}

#[test]
fn duplicate_sensitivity_entry_is_flagged() {
    let source = widget(
        "  signal a : std_logic;
  signal y : std_logic;

begin

  p_comb : process(a, a)
  begin
    y <= a;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Duplicate signal 'a' in sensitivity list.");
}

#[test]
fn sequential_clock_naming_convention() {
    let source = widget(
        "  signal foo : std_logic;
  signal q : std_logic;
  signal d : std_logic;

begin

  p_seq : process(foo)
  begin
    if rising_edge(foo) then
      q <= d;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_has(
        &diagnostics,
        "Invalid naming convention on clock signal 'foo'. \
         Allowed conventions are [clk_*, *_clk, *_clk_i].",
    );
    assert_has(&diagnostics, "[readability/naming] [1]");
}

#[test]
fn well_named_clock_passes() {
    let source = widget(
        "  signal q : std_logic;

begin

  p_seq : process(clk_i)
  begin
    if rising_edge(clk_i) then
      q <= d_i;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Invalid naming convention on clock signal");
    assert_lacks(&diagnostics, "Missing clock");
}

#[test]
fn missing_clock_in_sensitivity_list() {
    let source = widget(
        "  signal q : std_logic;

begin

  p_seq : process(d_i)
  begin
    if rising_edge(clk_i) then
      q <= d_i;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Missing clock 'clk_i' from sensitivity list");
    assert_has(&diagnostics, "[runtime/sensitivity] [5]");
}

#[test]
fn multiple_drivers_reports_the_prior_line() {
    let source = widget(
        "  signal sig : std_logic;

begin

  p_a : process(clk_i)
  begin
    if rising_edge(clk_i) then
      sig <= d_i;
    end if;
  end process p_a;

  p_b : process(clk_i)
  begin
    if rising_edge(clk_i) then
      sig <= not d_i;
    end if;
  end process p_b;
",
    );
    let diagnostics = lint(&source);
    let hit = diagnostics
        .iter()
        .find(|d| d.contains("Multiple drivers on signal 'sig'."))
        .expect("multiple-driver diagnostic");
    // The first process assigns on line 24; the second one trips on 31.
    assert!(hit.starts_with("test_widget.vhd:31:"), "got {:?}", hit);
    assert!(hit.contains("Previous drivers are on line(s): 24."), "got {:?}", hit);
    assert!(hit.contains("[runtime/multiple_drivers] [5]"), "got {:?}", hit);
}

#[test]
fn one_process_may_drive_a_signal_from_many_lines() {
    let source = widget(
        "  signal sig : std_logic;

begin

  p_a : process(clk_i)
  begin
    if rising_edge(clk_i) then
      sig <= d_i;
      sig <= not d_i;
    end if;
  end process p_a;
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Multiple drivers");
}

#[test]
fn combinational_loop_is_detected() {
    let source = widget(
        "  signal a : std_logic;
  signal y : std_logic;

begin

  p_comb : process(a, y)
  begin
    y <= a and y;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Possible combinational loop detected on signal 'y'.");
    assert_has(&diagnostics, "[runtime/combinational_loop] [5]");
}

#[test]
fn reserved_words_must_be_lower_case() {
    let source = format!("{}  IF x = '1' THEN\n", PREAMBLE);
    let diagnostics = lint(&source);
    let reserved: Vec<&String> = diagnostics
        .iter()
        .filter(|d| d.contains("[readability/reserved] [2]"))
        .collect();
    assert_eq!(reserved.len(), 2);
    assert!(reserved[0].contains("Invalid capitalization on 'IF'."));
    assert!(reserved[1].contains("Invalid capitalization on 'THEN'."));
}

#[test]
fn latch_inference_on_when_without_else() {
    let source = format!("{}  y <= a when sel = '1';\n", PREAMBLE);
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Inferred latch detected.");
    assert_has(&diagnostics, "[runtime/latches] [5]");
}

#[test]
fn unused_constant_is_reported_at_its_declaration() {
    let source = widget(
        "  constant C_FOO : integer := 3;

begin
",
    );
    let diagnostics = lint(&source);
    let hit = diagnostics
        .iter()
        .find(|d| d.contains("Unused identifier 'C_FOO'."))
        .expect("unused diagnostic");
    assert!(hit.starts_with("test_widget.vhd:17:"), "got {:?}", hit);
    assert!(hit.contains("[build/unused] [2]"), "got {:?}", hit);
}

#[test]
fn used_constant_is_not_reported() {
    let source = widget(
        "  constant C_FOO : integer := 3;
  signal y : std_logic;

begin

  p_comb : process(d_i)
  begin
    y <= d_i when C_FOO = 3 else '0';
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Unused identifier 'C_FOO'.");
}

#[test]
fn constant_naming_rules() {
    let source = widget(
        "  constant depth : integer := 4;

begin
",
    );
    let diagnostics = lint(&source);
    assert_has(
        &diagnostics,
        "Invalid capitalization on 'depth'. Constant names should use all upper case.",
    );
    assert_has(
        &diagnostics,
        "Invalid naming convention on 'depth'. Constant names should use prefix 'C_'.",
    );
}

#[test]
fn generic_naming_rules() {
    let source = format!(
        "{}entity test_gen is
  generic (
    G_WIDTH : integer := 8;
    depth : integer := 4
  );
end entity test_gen;
",
        PREAMBLE
    );
    let diagnostics = lint_named("test_gen.vhd", &source);
    assert_has(
        &diagnostics,
        "Invalid capitalization on 'depth'. Generic names should use all upper case.",
    );
    assert_has(
        &diagnostics,
        "Invalid naming convention on 'depth'. Generic names should use prefix 'G_'.",
    );
    assert_lacks(&diagnostics, "Invalid capitalization on 'G_WIDTH'.");
}

#[test]
fn port_mode_and_type_restrictions() {
    let source = format!(
        "{}entity test_gadget is
  port (
    clk_i : in std_logic;
    din_i : in integer;
    dout_o : buffer std_logic
  );
end entity test_gadget;
",
        PREAMBLE
    );
    let diagnostics = lint_named("test_gadget.vhd", &source);
    assert_has(&diagnostics, "Invalid port type 'integer'.");
    assert_has(&diagnostics, "Invalid port mode 'buffer'.");
    assert_has(&diagnostics, "Integer types must have a range specified.");
}

#[test]
fn filename_must_contain_entity_name() {
    let source = format!(
        "{}entity widget is
  port (
    clk_i : in std_logic
  );
end entity widget;
",
        PREAMBLE
    );
    let diagnostics = lint_named("something_else.vhd", &source);
    assert_has(&diagnostics, "Filename should contain entity name 'widget'");
    assert_has(&diagnostics, "[build/filename] [1]");
}

#[test]
fn unranged_integer_signal_is_an_error() {
    let source = widget(
        "  signal depth : integer;

begin
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Integer types must have a range specified.");
    assert_has(&diagnostics, "[runtime/integers] [5]");
}

#[test]
fn ranged_integer_signal_is_fine() {
    let source = widget(
        "  signal depth : integer range 0 to 7;

begin
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "must have a range specified");
}

#[test]
fn variables_in_processes_are_discouraged_and_shadowing_is_flagged() {
    let source = widget(
        "  signal cnt : std_logic;
  signal y : std_logic;

begin

  p_seq : process(clk_i)
    variable cnt : integer range 0 to 3;
  begin
    if rising_edge(clk_i) then
      cnt := 0;
      y <= d_i;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Variables are easily misused and should be avoided.");
    assert_has(
        &diagnostics,
        "Local variable 'cnt' shadows previously declared identifier.",
    );
    assert_has(
        &diagnostics,
        "Identifier is shadowed by later declared local variable 'cnt'.",
    );
}

#[test]
fn unused_local_variable_is_reported_when_the_scope_closes() {
    let source = widget(
        "  signal y : std_logic;

begin

  p_seq : process(clk_i)
    variable v_spare : integer range 0 to 3;
  begin
    if rising_edge(clk_i) then
      y <= d_i;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Unused local identifier 'v_spare'.");
}

#[test]
fn positional_port_map_is_flagged() {
    let source = widget(
        "  signal b : std_logic;

begin

  u_sub : some_entity
    port map (
      clk_i,
      y => b
    );
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Positional port mapping not allowed. Use named mapping.");
    assert_has(&diagnostics, "[readability/portmaps] [4]");
}

#[test]
fn named_port_map_passes() {
    let source = widget(
        "  signal b : std_logic;

begin

  u_sub : some_entity
    port map (
      clk => clk_i,
      y => b
    );
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Positional port mapping");
}

#[test]
fn deprecated_packages_are_flagged() {
    let source = "\
-- Copyright 2024 Example Co.
-- header

library ieee;
use ieee.std_logic_unsigned.all;
";
    let diagnostics = lint(source);
    assert_has(
        &diagnostics,
        "Non-standard package 'std_logic_unsigned'. Use ieee.numeric_std instead.",
    );
    assert_has(&diagnostics, "[build/deprecated] [5]");
}

#[test]
fn fsm_enum_naming_rules() {
    let source = widget(
        "  type t_state is (IDLE, RUN_ST, stop);

begin
",
    );
    let diagnostics = lint(&source);
    assert_has(
        &diagnostics,
        "Invalid naming convention on enum FSM type 'IDLE'.",
    );
    assert_has(
        &diagnostics,
        "Invalid capitalization on 'stop'. Enum values should use all upper case.",
    );
    assert_lacks(&diagnostics, "Invalid naming convention on enum FSM type 'RUN_ST'.");
}

#[test]
fn component_declarations_are_discouraged() {
    let source = widget(
        "  component some_fifo
  end component;

begin
",
    );
    let diagnostics = lint(&source);
    assert_has(
        &diagnostics,
        "Detected component 'some_fifo'. Direct instantiation is preferred",
    );
}

#[test]
fn allow_listed_component_passes() {
    let source = widget(
        "  component iobuf
  end component;

begin
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Direct instantiation is preferred");
}

#[test]
fn nolint_suppresses_a_diagnostic_on_its_line() {
    let source = format!(
        "{}  y <= a when sel = '1'; -- NOLINT(runtime/latches)\n",
        PREAMBLE
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Inferred latch detected.");
}

#[test]
fn nolint_region_suppresses_between_begin_and_end() {
    let source = format!(
        "{}-- NOLINTBEGIN(runtime/latches)
  y <= a when sel = '1';
-- NOLINTEND(runtime/latches)
  y <= b when sel = '0';
",
        PREAMBLE
    );
    let diagnostics = lint(&source);
    let latches: Vec<&String> = diagnostics
        .iter()
        .filter(|d| d.contains("Inferred latch detected."))
        .collect();
    assert_eq!(latches.len(), 1);
}

#[test]
fn filters_drop_and_reinstate_by_prefix() {
    let source = format!(
        "{}  y <= a when sel = '1';
  wait for 10ns;
",
        PREAMBLE
    );
    let diagnostics = lint_with(
        "test_widget.vhd",
        &source,
        Options {
            filters: "-runtime,+runtime/latches".to_string(),
            ..Options::default()
        },
    );
    assert_has(&diagnostics, "Inferred latch detected.");
    assert_has(&diagnostics, "Missing space before time units.");
}

#[test]
fn raising_verbose_level_only_removes_diagnostics() {
    let source = widget(
        "  signal Foo : std_logic;

begin
",
    );
    let low = lint_with("test_widget.vhd", &source, Options::default());
    let high = lint_with(
        "test_widget.vhd",
        &source,
        Options {
            verbose_level: 3,
            ..Options::default()
        },
    );
    assert!(high.len() <= low.len());
    for diagnostic in &high {
        assert!(low.contains(diagnostic));
    }
    // The capitalization nit (confidence 1) is gone at level 3.
    assert_has(&low, "Invalid capitalization on 'Foo'.");
    assert_lacks(&high, "Invalid capitalization on 'Foo'.");
}

#[test]
fn mixed_line_endings_warn_on_the_cr_lines() {
    let source = "-- Copyright 2024 Example Co.\r\n-- header\n";
    let diagnostics = lint(source);
    let newline: Vec<&String> = diagnostics
        .iter()
        .filter(|d| d.contains("Unexpected \\r (^M) found"))
        .collect();
    assert_eq!(newline.len(), 1);
    assert!(newline[0].starts_with("test_widget.vhd:1:"));
}

#[test]
fn uniform_crlf_endings_do_not_warn() {
    let source = "-- Copyright 2024 Example Co.\r\n-- header\r\n";
    let diagnostics = lint(source);
    assert_lacks(&diagnostics, "Unexpected \\r");
}

#[test]
fn infinite_loop_without_wait_or_exit() {
    let source = widget(
        "  signal y : std_logic;

begin

  p_sim : process
  begin
    loop
      y <= d_i;
    end loop;
  end process p_sim;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Infinite loop. Loop must contain wait or exit statement.");
    assert_has(&diagnostics, "[runtime/loops] [4]");
}

#[test]
fn loop_with_exit_passes() {
    let source = widget(
        "  signal y : std_logic;

begin

  p_sim : process
  begin
    loop
      y <= d_i;
      exit;
    end loop;
  end process p_sim;
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Infinite loop.");
}

#[test]
fn redundant_fsm_state_assignment() {
    let source = widget(
        "  type t_state is (ST_IDLE, ST_RUN);
  signal state : std_logic;

begin

  p_seq : process(clk_i)
  begin
    if rising_edge(clk_i) then
      case state is
        when ST_IDLE =>
          state <= ST_IDLE;
        when ST_RUN =>
          state <= ST_IDLE;
      end case;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Redundant assignment of state 'state' to 'ST_IDLE'");
    assert_has(&diagnostics, "[readability/fsm] [4]");
}

#[test]
fn boolean_comparison_and_vhdl2008_conditions() {
    let source = widget(
        "  signal ready : std_logic;
  signal done : boolean;
  signal y : std_logic;

begin

  p_comb : process(ready, done)
  begin
    if done = true then
      y <= '1';
    end if;
    if ready then
      y <= '0';
    end if;
    if done then
      y <= '1';
    end if;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Redundant boolean equality check.");
    assert_has(&diagnostics, "Avoid VHDL2008 'boolean style' conditional on 'ready'.");
    assert_lacks(&diagnostics, "Avoid VHDL2008 'boolean style' conditional on 'done'.");
}

#[test]
fn reading_an_output_port_is_flagged() {
    let source = widget(
        "  signal y : std_logic;

begin

  p_comb : process(q_o)
  begin
    y <= q_o;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Avoid VHDL2008 reading of output port on 'q_o'.");
    assert_has(&diagnostics, "[build/vhdl2008/outputs] [4]");
}

#[test]
fn process_all_sensitivity_is_a_vhdl2008_construct() {
    let source = widget(
        "  signal y : std_logic;

begin

  p_comb : process(all)
  begin
    y <= d_i;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_has(&diagnostics, "Avoid VHDL2008 construct 'all' in sensitivity list.");
    // With `all`, missing-signal checks are off.
    assert_lacks(&diagnostics, "Missing signal");
}

#[test]
fn tick_event_prefers_rising_edge() {
    let source = widget(
        "  signal q : std_logic;

begin

  p_seq : process(clk_i)
  begin
    if clk_i'event and clk_i = '1' then
      q <= d_i;
    end if;
  end process p_seq;
",
    );
    let diagnostics = lint(&source);
    assert_has(
        &diagnostics,
        "Use 'rising_edge/falling_edge(clk_i)' instead of 'clk_i'event'",
    );
    assert_has(&diagnostics, "[runtime/rising_edge] [4]");
}

#[test]
fn emacs_format_is_exact() {
    let source = "-- Copyright 2024 Example Co.\n-- header\n\tfoo\n";
    let diagnostics = lint(source);
    assert!(diagnostics.contains(
        &"test_widget.vhd:3:[1,2]: Tab found; better to use spaces [whitespace/tab] [1]\n"
            .to_string()
    ));
}

#[test]
fn multiline_sensitivity_list_is_captured() {
    let source = widget(
        "  signal a : std_logic;
  signal b : std_logic;
  signal y : std_logic;

begin

  p_comb : process(a,
                   b)
  begin
    y <= a and b;
  end process p_comb;
",
    );
    let diagnostics = lint(&source);
    assert_lacks(&diagnostics, "Missing signal");
}
