use crate::solver::{cost::SolutionCost, solution::working_solution::WorkingSolution};

/// Best solution seen so far. Only ever replaced by a strictly better one.
pub struct Incumbent {
    solution: WorkingSolution,
    cost: SolutionCost,
}

impl Incumbent {
    pub fn new(solution: WorkingSolution) -> Self {
        let cost = solution.cost();
        Incumbent { solution, cost }
    }

    pub fn solution(&self) -> &WorkingSolution {
        &self.solution
    }

    pub fn cost(&self) -> &SolutionCost {
        &self.cost
    }

    /// Keeps a copy of `solution` when it beats the incumbent.
    pub fn offer(&mut self, solution: &WorkingSolution) -> bool {
        let cost = solution.cost();
        if cost.is_better_than(&self.cost) {
            self.solution = solution.clone();
            self.cost = cost;
            true
        } else {
            false
        }
    }

    pub fn into_solution(self) -> WorkingSolution {
        self.solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::capacity::Capacity,
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_only_better_solutions_replace_incumbent() {
        let problem = test_utils::create_default_problem(4, 1, Capacity::weight(10.0));
        let empty = test_utils::create_test_working_solution(problem.clone(), vec![]);
        let planned = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2, 3],
            }],
        );

        let mut incumbent = Incumbent::new(planned.clone());
        assert!(!incumbent.offer(&empty));
        assert!(incumbent.solution().is_identical(&planned));

        let mut incumbent = Incumbent::new(empty);
        assert!(incumbent.offer(&planned));
        assert_eq!(incumbent.cost().unassigned, 0);
    }
}
