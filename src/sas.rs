//! Reader for the block-structured SAS+ text written by the translator.
//!
//! The text is first split into [`Section`]s: `begin_X ... end_X` blocks and
//! the bare count lines the translator places between them. Each block is
//! then consumed through a [`BlockReader`], which checks every declared count
//! against the lines actually present instead of reading past the block end.

use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;
use crate::error::{Error, Result};

/// Marks a fact in an effect record that carries no condition.
pub const NO_CONDITION: i64 = -1;

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct Line<'a> {
    pub number: usize,
    pub text: &'a str
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Block<'a> {
    pub kind: &'a str,
    pub begin: usize,
    pub end: usize,
    pub lines: Vec<Line<'a>>
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub enum Section<'a> {
    Block(Block<'a>),
    /// A bare integer announcing how many blocks of one kind follow.
    Count(Line<'a>, usize)
}

fn opens_block(line: &str) -> Option<&str> {
    match line.strip_prefix("begin_") {
        Some(kind) if !kind.is_empty() && !kind.contains(char::is_whitespace) => Some(kind),
        _ => None
    }
}

/// Splits translator output into sections. Blank lines are dropped. Inside a
/// block only `end_<kind>` is special, so value or operator names that look
/// like markers stay content.
pub fn sections(text: &str) -> Result<Vec<Section<'_>>> {
    let mut sections = Vec::new();
    let mut current: Option<Block> = None;
    for (i, raw) in text.lines().enumerate() {
        let number = i + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match current.take() {
            Some(mut block) => {
                if line.strip_prefix("end_") == Some(block.kind) {
                    block.end = number;
                    sections.push(Section::Block(block));
                } else {
                    block.lines.push(Line {number, text: line});
                    current = Some(block);
                }
            }
            None => match opens_block(line) {
                Some(kind) => current = Some(Block {kind, begin: number, end: number, lines: Vec::new()}),
                None => match line.parse::<usize>() {
                    Ok(count) => sections.push(Section::Count(Line {number, text: line}, count)),
                    Err(_) => return Err(Error::malformed(number, format!("unexpected {:?} outside of any block", line)))
                }
            }
        }
    }
    match current {
        Some(block) => Err(Error::malformed(block.begin, format!("begin_{} is never closed", block.kind))),
        None => Ok(sections)
    }
}

/// A count line must be followed by exactly that many blocks of one kind.
fn check_declared_counts(sections: &[Section]) -> Result<()> {
    for (i, section) in sections.iter().enumerate() {
        let (line, count) = match section {
            Section::Count(line, count) if *count > 0 => (line, *count),
            _ => continue
        };
        let kind = match sections.get(i + 1) {
            Some(Section::Block(block)) => block.kind,
            _ => return Err(Error::malformed(line.number, format!("{} blocks announced but none follow", count)))
        };
        let found = sections[i + 1..].iter()
            .take_while(|s| matches!(s, Section::Block(block) if block.kind == kind))
            .count();
        if found != count {
            return Err(Error::malformed(line.number, format!("{} {} blocks announced, {} found", count, kind, found)));
        }
    }
    Ok(())
}

pub struct BlockReader<'b, 'a> {
    block: &'b Block<'a>,
    next: usize
}

impl<'b, 'a> BlockReader<'b, 'a> {
    pub fn new(block: &'b Block<'a>) -> Self {
        BlockReader {block, next: 0}
    }

    pub fn remaining(&self) -> usize {
        self.block.lines.len() - self.next
    }

    pub fn next_line(&mut self, what: &str) -> Result<Line<'a>> {
        match self.block.lines.get(self.next) {
            None => Err(Error::malformed(self.block.end, format!("begin_{} from line {} ends before its {}",
                                                                  self.block.kind, self.block.begin, what))),
            Some(line) => {
                self.next += 1;
                Ok(*line)
            }
        }
    }

    pub fn next_int<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let line = self.next_line(what)?;
        line.text.parse::<T>()
            .map_err(|_| Error::malformed(line.number, format!("expected {}, found {:?}", what, line.text)))
    }

    pub fn next_ints(&mut self, what: &str) -> Result<(usize, Vec<i64>)> {
        let line = self.next_line(what)?;
        let ints = line.text.split_whitespace()
            .map(|t| t.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::malformed(line.number, format!("expected integers in {}, found {:?}", what, line.text)))?;
        Ok((line.number, ints))
    }

    pub fn finish(self) -> Result<()> {
        match self.block.lines.get(self.next) {
            None => Ok(()),
            Some(line) => Err(Error::malformed(line.number, format!("{} unexpected lines at the end of begin_{} from line {}",
                                                                     self.remaining(), self.block.kind, self.block.begin)))
        }
    }
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct SasVariable {
    pub name: String,
    pub axiom_layer: i64,
    pub domain_size: usize,
    pub values: Vec<String>
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct SasOperator {
    pub name: String,
    pub arguments: Vec<String>,
    pub preconditions: BTreeSet<(usize,usize)>,
    pub effects: BTreeSet<(usize,usize)>,
    pub cost: Option<i64>,
    pub line: usize
}

#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub struct SasTask {
    pub variables: Vec<SasVariable>,
    pub initial_state: Vec<usize>,
    pub goal: Vec<(usize,usize)>,
    pub operators: Vec<SasOperator>
}

fn fact(variables: &[SasVariable], var: i64, value: i64, line: usize) -> Result<(usize,usize)> {
    let index = match usize::try_from(var).ok().filter(|v| *v < variables.len()) {
        None => return Err(Error::malformed(line, format!("variable {} out of range (0..{})", var, variables.len()))),
        Some(v) => v
    };
    let size = variables[index].domain_size;
    match usize::try_from(value).ok().filter(|v| *v < size) {
        None => Err(Error::malformed(line, format!("value {} out of range for {} (0..{})", value, variables[index].name, size))),
        Some(v) => Ok((index, v))
    }
}

fn next_fact(reader: &mut BlockReader, variables: &[SasVariable], what: &str) -> Result<(usize,usize)> {
    let (line, ints) = reader.next_ints(what)?;
    match ints.as_slice() {
        [var, value] => fact(variables, *var, *value, line),
        _ => Err(Error::malformed(line, format!("{} needs a variable and a value, found {} fields", what, ints.len())))
    }
}

fn parse_variable(block: &Block) -> Result<SasVariable> {
    let mut reader = BlockReader::new(block);
    let name = reader.next_line("variable name")?.text.to_string();
    let axiom_layer = reader.next_int::<i64>("axiom layer")?;
    let domain_size = reader.next_int::<usize>("domain size")?;
    if domain_size == 0 {
        return Err(Error::malformed(block.begin, format!("variable {} has an empty domain", name)));
    }
    let values = (0..domain_size)
        .map(|_| reader.next_line("value name").map(|l| l.text.to_string()))
        .collect::<Result<Vec<_>>>()?;
    reader.finish()?;
    Ok(SasVariable {name, axiom_layer, domain_size, values})
}

fn parse_state(block: &Block, variables: &[SasVariable]) -> Result<Vec<usize>> {
    let mut reader = BlockReader::new(block);
    let mut state = Vec::with_capacity(variables.len());
    for var in 0..variables.len() {
        let (line, ints) = reader.next_ints("initial value")?;
        match ints.as_slice() {
            [value] => state.push(fact(variables, var as i64, *value, line)?.1),
            _ => return Err(Error::malformed(line, format!("initial value needs one field, found {}", ints.len())))
        }
    }
    reader.finish()?;
    Ok(state)
}

fn parse_goal(block: &Block, variables: &[SasVariable]) -> Result<Vec<(usize,usize)>> {
    let mut reader = BlockReader::new(block);
    let count = reader.next_int::<usize>("goal count")?;
    let mut goal: Vec<(usize,usize)> = Vec::with_capacity(count);
    for _ in 0..count {
        let (var, value) = next_fact(&mut reader, variables, "goal")?;
        match goal.iter().find(|(v, _)| *v == var).copied() {
            None => goal.push((var, value)),
            Some((_, seen)) if seen == value => {}
            Some((_, seen)) => return Err(Error::malformed(block.begin, format!("goal sets {} to both {} and {}",
                                                                                variables[var].name, seen, value)))
        }
    }
    reader.finish()?;
    Ok(goal)
}

/// Effect records are `conditions var pre post`. Only unconditional
/// records are accepted; a `pre` other than [`NO_CONDITION`] becomes a
/// precondition of the operator.
fn parse_operator(block: &Block, variables: &[SasVariable]) -> Result<SasOperator> {
    let mut reader = BlockReader::new(block);
    let header = reader.next_line("operator name")?;
    let mut tokens = header.text.split_whitespace().map(str::to_string);
    let name = match tokens.next() {
        None => return Err(Error::malformed(header.number, "operator without a name")),
        Some(name) => name
    };
    let arguments = tokens.collect::<Vec<_>>();

    let mut preconditions = BTreeSet::new();
    for _ in 0..reader.next_int::<usize>("precondition count")? {
        preconditions.insert(next_fact(&mut reader, variables, "precondition")?);
    }

    let mut effects = BTreeSet::new();
    for _ in 0..reader.next_int::<usize>("effect count")? {
        let (line, record) = reader.next_ints("effect")?;
        match record.as_slice() {
            [0, var, pre, post] => {
                if *pre != NO_CONDITION {
                    preconditions.insert(fact(variables, *var, *pre, line)?);
                }
                effects.insert(fact(variables, *var, *post, line)?);
            }
            [conditions, ..] if *conditions != 0 =>
                return Err(Error::malformed(line, format!("conditional effects are not supported ({} effect conditions)", conditions))),
            _ => return Err(Error::malformed(line, format!("effect needs 4 fields, found {}", record.len())))
        }
    }

    let cost = if reader.remaining() > 0 {Some(reader.next_int::<i64>("operator cost")?)} else {None};
    reader.finish()?;
    Ok(SasOperator {name, arguments, preconditions, effects, cost, line: block.begin})
}

pub fn parse_sas(text: &str) -> Result<SasTask> {
    let sections = sections(text)?;
    check_declared_counts(&sections)?;
    let blocks = sections.iter().filter_map(|s| match s {
        Section::Block(block) => Some(block),
        Section::Count(..) => None
    }).collect::<Vec<_>>();

    let variables = blocks.iter()
        .filter(|b| b.kind == "variable")
        .map(|b| parse_variable(b))
        .collect::<Result<Vec<_>>>()?;

    let mut task = SasTask {variables, ..SasTask::default()};
    let mut seen_goal = false;
    let mut seen_state = false;
    for block in blocks.iter() {
        match block.kind {
            "variable" => {}
            "state" if seen_state => return Err(Error::malformed(block.begin, "second begin_state block")),
            "state" => {
                task.initial_state = parse_state(block, &task.variables)?;
                seen_state = true;
            }
            "goal" if seen_goal => return Err(Error::malformed(block.begin, "second begin_goal block")),
            "goal" => {
                task.goal = parse_goal(block, &task.variables)?;
                seen_goal = true;
            }
            "operator" => task.operators.push(parse_operator(block, &task.variables)?),
            other => debug!(kind = other, line = block.begin, "skipping block")
        }
    }
    debug!(variables = task.variables.len(), goals = task.goal.len(), operators = task.operators.len(),
           "parsed translator output");
    Ok(task)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const BLOCKS_SAS: &str = "begin_version
3
end_version
begin_metric
0
end_metric
3
begin_variable
var0
-1
2
Atom clear(a)
NegatedAtom clear(a)
end_variable
begin_variable
var1
-1
2
Atom handempty()
NegatedAtom handempty()
end_variable
begin_variable
var2
-1
3
Atom holding(a)
Atom on(a, b)
Atom ontable(a)
end_variable
0
begin_state
0
0
2
end_state
begin_goal
1
2 1
end_goal
2
begin_operator
pick-up a
0
3
0 0 0 1
0 1 0 1
0 2 2 0
1
end_operator
begin_operator
stack a b
1
1 1
2
0 2 0 1
0 0 -1 0
1
end_operator
0
";

    fn variable(size: usize) -> String {
        let values = (0..size).map(|i| format!("Atom p{}()\n", i)).collect::<String>();
        format!("begin_variable\nv\n-1\n{}\n{}end_variable\n", size, values)
    }

    #[test]
    fn blocks_task() {
        let task = parse_sas(BLOCKS_SAS).unwrap();
        assert_eq!(task.variables.iter().map(|v| (v.name.as_str(), v.domain_size)).collect::<Vec<_>>(),
                   vec![("var0", 2), ("var1", 2), ("var2", 3)]);
        assert_eq!(task.variables[2].values[1], "Atom on(a, b)");
        assert_eq!(task.initial_state, vec![0, 0, 2]);
        assert_eq!(task.goal, vec![(2, 1)]);
        assert_eq!(task.operators.len(), 2);
        let pick_up = &task.operators[0];
        assert_eq!(pick_up.name, "pick-up");
        assert_eq!(pick_up.arguments, vec!["a"]);
        assert_eq!(pick_up.preconditions, BTreeSet::from([(0, 0), (1, 0), (2, 2)]));
        assert_eq!(pick_up.effects, BTreeSet::from([(0, 1), (1, 1), (2, 0)]));
        assert_eq!(pick_up.cost, Some(1));
        let stack = &task.operators[1];
        assert_eq!(stack.preconditions, BTreeSet::from([(1, 1), (2, 0)]));
        assert_eq!(stack.effects, BTreeSet::from([(2, 1), (0, 0)]));
    }

    #[test]
    fn promotes_effect_condition() {
        let text = format!("{}{}{}begin_operator\nop\n0\n1\n0 2 5 7\nend_operator\n", variable(2), variable(2), variable(8));
        let task = parse_sas(&text).unwrap();
        assert_eq!(task.operators[0].preconditions, BTreeSet::from([(2, 5)]));
        assert_eq!(task.operators[0].effects, BTreeSet::from([(2, 7)]));
        assert_eq!(task.operators[0].cost, None);
    }

    #[test]
    fn sentinel_adds_no_precondition() {
        let text = format!("{}{}{}begin_operator\nop\n0\n1\n0 2 -1 7\nend_operator\n", variable(2), variable(2), variable(8));
        let task = parse_sas(&text).unwrap();
        assert!(task.operators[0].preconditions.iter().all(|(var, _)| *var != 2));
        assert_eq!(task.operators[0].effects, BTreeSet::from([(2, 7)]));
    }

    #[test]
    fn missing_goal_is_empty() {
        let task = parse_sas(&variable(2)).unwrap();
        assert!(task.goal.is_empty());
        assert!(task.operators.is_empty());
        assert!(task.initial_state.is_empty());
    }

    #[test]
    fn short_variable_block() {
        let text = "begin_variable\nv\n-1\n3\nAtom p()\nNegatedAtom p()\nend_variable\n";
        assert!(matches!(parse_sas(text), Err(Error::Malformed {line: 7, ..})));
    }

    #[test]
    fn long_variable_block() {
        let text = "begin_variable\nv\n-1\n1\nAtom p()\nNegatedAtom p()\nend_variable\n";
        assert!(matches!(parse_sas(text), Err(Error::Malformed {line: 6, ..})));
    }

    #[test]
    fn goal_count_mismatch() {
        let text = format!("{}begin_goal\n2\n0 1\nend_goal\n", variable(2));
        assert!(matches!(parse_sas(&text), Err(Error::Malformed {..})));
        let text = format!("{}begin_goal\n1\n0 1\n0 0\nend_goal\n", variable(2));
        assert!(matches!(parse_sas(&text), Err(Error::Malformed {..})));
    }

    #[test]
    fn repeated_goal_facts() {
        let text = format!("{}{}begin_goal\n3\n1 0\n0 1\n1 0\nend_goal\n", variable(2), variable(2));
        assert_eq!(parse_sas(&text).unwrap().goal, vec![(1, 0), (0, 1)]);
        let text = format!("{}begin_goal\n2\n0 1\n0 0\nend_goal\n", variable(2));
        match parse_sas(&text) {
            Err(Error::Malformed {line, message}) => {
                assert_eq!(line, 8);
                assert!(message.contains("both 1 and 0"));
            }
            other => panic!("unexpected {:?}", other)
        }
    }

    #[test]
    fn operator_overruns_effect_count() {
        let text = format!("{}begin_operator\nop\n0\n2\n0 0 -1 1\nend_operator\n", variable(2));
        assert!(matches!(parse_sas(&text), Err(Error::Malformed {..})));
    }

    #[test]
    fn rejects_conditional_effects() {
        let text = format!("{}{}begin_operator\nop\n0\n1\n1 1 0 0 -1 1\nend_operator\n", variable(2), variable(2));
        match parse_sas(&text) {
            Err(Error::Malformed {message, ..}) => assert!(message.contains("conditional")),
            other => panic!("unexpected {:?}", other)
        }
    }

    #[test]
    fn rejects_out_of_range_facts() {
        let text = format!("{}begin_goal\n1\n1 0\nend_goal\n", variable(2));
        assert!(matches!(parse_sas(&text), Err(Error::Malformed {..})));
        let text = format!("{}begin_goal\n1\n0 2\nend_goal\n", variable(2));
        assert!(matches!(parse_sas(&text), Err(Error::Malformed {..})));
    }

    #[test]
    fn unterminated_block() {
        let text = "begin_goal\n0\n";
        assert!(matches!(parse_sas(text), Err(Error::Malformed {line: 1, ..})));
    }

    #[test]
    fn announced_count_must_match() {
        let text = format!("2\n{}", variable(2));
        assert!(matches!(parse_sas(&text), Err(Error::Malformed {line: 1, ..})));
    }

    #[test]
    fn stray_text_outside_blocks() {
        assert!(matches!(parse_sas("hello\n"), Err(Error::Malformed {line: 1, ..})));
    }

    #[test]
    fn marker_like_operator_name() {
        let text = format!("{}begin_operator\nend_turn\n0\n1\n0 0 -1 1\nend_operator\n", variable(2));
        let task = parse_sas(&text).unwrap();
        assert_eq!(task.operators[0].name, "end_turn");
    }

    #[test]
    fn sections_skip_blank_lines() {
        let sections = sections("\nbegin_goal\n\n1\n\n0 1\nend_goal\n\n").unwrap();
        match &sections[..] {
            [Section::Block(block)] => {
                assert_eq!(block.kind, "goal");
                assert_eq!(block.lines.iter().map(|l| l.text).collect::<Vec<_>>(), vec!["1", "0 1"]);
                assert_eq!((block.begin, block.end), (2, 7));
            }
            other => panic!("unexpected {:?}", other)
        }
    }
}
