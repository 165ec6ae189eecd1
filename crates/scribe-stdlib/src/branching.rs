//! Branch creation and manipulation macros.

use scribe::branch::{BranchId, BranchType};
use scribe::context::{MacroBinding, MacroMap};
use scribe::error::{ExecError, InternalError};
use scribe::executor::Executor;
use scribe::node::{CallNode, Node, TextNode};

pub(crate) fn register(macros: &mut MacroMap) {
    macros.insert(
        "branch.write".to_string(),
        MacroBinding::builtin("branch_name,*contents", false, |executor, _, args| {
            let id = find_branch(executor, args.text(0))?;
            let saved = executor.current_branch;
            executor.current_branch = id;
            let result = executor.execute_nodes(args.nodes(1));
            executor.current_branch = saved;
            result
        }),
    );
    macros.insert(
        "branch.create.root".to_string(),
        MacroBinding::builtin(
            "branch_type,name_or_ref,filename_suffix",
            false,
            |executor, call_node, args| {
                let type_name = args.text(0);
                let Some(branch_type) = BranchType::from_name(type_name) else {
                    return Err(InternalError::new(format!(
                        "unknown branch type: {type_name}; expected one of: html, latex, text"
                    ))
                    .into());
                };
                let filename_suffix = args.text(2);
                let writer = if filename_suffix.is_empty() {
                    None
                } else {
                    Some(executor.get_output_writer(filename_suffix)?)
                };
                let parent_context = executor.current_branch_context();
                create_named(executor, call_node, args.text(1), move |executor, name| {
                    executor.create_branch(branch_type, None, Some(parent_context), name, writer)
                })
            },
        ),
    );
    macros.insert(
        "branch.create.sub".to_string(),
        MacroBinding::builtin("name_or_ref", false, |executor, call_node, args| {
            let parent = executor.current_branch;
            create_named(executor, call_node, args.text(0), move |executor, name| {
                executor.create_sub_branch(parent, name)
            })
        }),
    );
    macros.insert(
        "branch.append".to_string(),
        MacroBinding::builtin("branch_name", false, |executor, _, args| {
            let id = find_branch(executor, args.text(0))?;
            executor.append_sub_branch(id)?;
            Ok(())
        }),
    );
}

fn find_branch(executor: &Executor, name: &str) -> Result<BranchId, InternalError> {
    executor
        .find_branch(name)
        .ok_or_else(|| InternalError::new(format!("branch not found: {name}")))
}

/// Creates and registers a branch. A `name_or_ref` starting with `!` asks
/// for an automatically assigned branch name and defines a macro of the
/// remaining name expanding to it.
fn create_named(
    executor: &mut Executor,
    call_node: &CallNode,
    name_or_ref: &str,
    create: impl FnOnce(&mut Executor, Option<String>) -> BranchId,
) -> Result<(), ExecError> {
    let reference = name_or_ref.strip_prefix('!');
    let name = match reference {
        Some(_) => None,
        None => {
            if executor.find_branch(name_or_ref).is_some() {
                return Err(InternalError::new(format!(
                    "a branch of this name already exists: {name_or_ref}"
                ))
                .into());
            }
            Some(name_or_ref.to_string())
        }
    };
    let id = create(executor, name);
    executor.register_branch(id);
    if let Some(reference) = reference {
        let assigned = executor
            .branch(id)
            .name()
            .expect("registration names every branch")
            .to_string();
        let node = Node::Text(TextNode::new(call_node.location.clone(), assigned));
        executor
            .current_branch_context()
            .add_macro(reference, MacroBinding::execute_nodes(vec![node], None));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use scribe::testing::Harness;
    use scribe::{execution_failure_test, execution_test};

    fn html_doc(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\"\n\
             \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n\
             <html>\n\
             <head>\n\
             <meta http-equiv=\"Content-Type\" \
             content=\"application/xhtml+xml; charset=utf-8\"/>\n\
             </head>\n\
             <body>\n{body}</body>\n\
             </html>\n"
        )
    }

    execution_test!(
        named_sub_branch_splices_at_the_append_point,
        crate::built_ins(),
        "$branch.create.sub[aside]before$branch.append[aside]after\
         $branch.write[aside][inside]",
        "beforeinsideafter"
    );

    execution_test!(
        reference_names_resolve_to_assigned_names,
        crate::built_ins(),
        "$branch.create.sub[!note]$branch.write[$note][x]$branch.append[$note]",
        "x"
    );

    execution_failure_test!(
        duplicate_branch_names_are_rejected,
        crate::built_ins(),
        "$branch.create.sub[aside]$branch.create.sub[aside]",
        "/root.psc:1: $branch.create.sub: a branch of this name already exists: aside"
    );

    execution_test!(
        unattached_sub_branches_render_nothing,
        crate::built_ins(),
        "$branch.create.sub[draft]$branch.write[draft][hidden]visible",
        "visible"
    );

    execution_failure_test!(
        appending_twice_fails,
        crate::built_ins(),
        "$branch.create.sub[aside]$branch.append[aside]$branch.append[aside]",
        "/root.psc:1: $branch.append: the sub-branch 'aside' is already attached"
    );

    execution_failure_test!(
        appending_into_a_branch_that_did_not_create_the_sub_fails,
        crate::built_ins(),
        "$branch.create.sub[inner]$branch.create.root[text][other][]\
         $branch.write[other][$branch.append[inner]]",
        "/root.psc:1: $branch.append: expected a sub-branch created by branch 'other'; \
         got one created by branch 'system'\n  /root.psc:1: $branch.write"
    );

    execution_failure_test!(
        writing_to_an_unknown_branch_fails,
        crate::built_ins(),
        "$branch.write[nope][x]",
        "/root.psc:1: $branch.write: branch not found: nope"
    );

    execution_failure_test!(
        unknown_branch_type,
        crate::built_ins(),
        "$branch.create.root[pdf][book][]",
        "/root.psc:1: $branch.create.root: \
         unknown branch type: pdf; expected one of: html, latex, text"
    );

    #[test]
    fn root_text_branch_renders_to_its_output_file() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run_and_render(
                "$branch.create.root[text][out][report.txt]$branch.write[out][data]",
            )
            .unwrap();
        assert_eq!(
            harness.output_file("/output/report.txt").as_deref(),
            Some("data")
        );
    }

    #[test]
    fn html_branch_renders_a_full_document() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run(
                "$branch.create.root[html][main][]\
                 $branch.write[main][Hello world!]",
            )
            .unwrap();
        assert_eq!(
            harness.branch_output("main"),
            html_doc("<p>Hello world!</p>\n")
        );
    }

    #[test]
    fn empty_marked_elements_vanish_with_their_text_merged() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run(
                "$branch.create.root[html][page][]\
                 $branch.write[page][before \
                 $tag.open[span][inline]$tag.delete.ifempty[current]$tag.close[span] after]",
            )
            .unwrap();
        assert_eq!(
            harness.branch_output("page"),
            html_doc("<p>before after</p>\n")
        );
    }

    #[test]
    fn attribute_and_class_macros_edit_the_current_element() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run(
                "$branch.create.root[html][page][]\
                 $branch.write[page][$tag.open[div][block]\
                 $tag.attr.set[current][id][main]\
                 $tag.class.add[current][wide note]\
                 $tag.class.add[current][note shaded]\
                 x$tag.close[div]]",
            )
            .unwrap();
        assert_eq!(
            harness.branch_output("page"),
            html_doc("<div id=\"main\" class=\"wide note shaded\">x</div>\n")
        );
    }

    #[test]
    fn raw_body_text_keeps_its_spacing() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run(
                "$branch.create.root[html][page][]\
                 $branch.write[page][$tag.body.raw[a  b]]",
            )
            .unwrap();
        assert_eq!(harness.branch_output("page"), html_doc("<p>a  b</p>\n"));
    }

    #[test]
    fn latex_branch_rebinds_special_characters() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run(
                "$branch.create.root[latex][main][]\
                 $branch.write[main][50$text.percent]$text.percent",
            )
            .unwrap();
        assert_eq!(harness.branch_output("main"), "50\\%");
        assert_eq!(harness.system_output(), "%");
    }

    #[test]
    fn branch_type_macro_reports_the_current_branch() {
        let mut harness = Harness::new(crate::built_ins());
        harness
            .run(
                "$branch.create.root[html][main][]\
                 $branch.type:$branch.write[main][$branch.type]",
            )
            .unwrap();
        assert_eq!(harness.system_output(), "text:");
        assert!(harness.branch_output("main").contains("<p>html</p>"));
    }
}
